//! `health` 명령: `/health/ready` 결과 출력.

use anyhow::Context;
use serde_json::Value;
use std::time::Duration;

pub async fn check_health(server: &str) -> anyhow::Result<()> {
    println!("\n시스템 상태 확인 중...");

    let url = format!("{}/health/ready", server.trim_end_matches('/'));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            println!("❌ 서버 연결 실패: {} ({})", server, e);
            return Ok(());
        }
    };

    let status = response.status();
    let body: Value = response
        .json()
        .await
        .context("상태 응답을 해석할 수 없습니다")?;

    println!("{}", describe_health(status.is_success(), &body));
    Ok(())
}

/// 준비 상태 응답을 사람이 읽을 수 있는 줄들로 변환.
fn describe_health(ok: bool, body: &Value) -> String {
    let mut lines = vec![if ok {
        "✅ 서버: 정상".to_string()
    } else {
        "⚠️  서버: 준비되지 않음".to_string()
    }];

    match body["kis"]["configured"].as_bool() {
        Some(true) => lines.push(format!(
            "✅ KIS API: 설정됨 ({})",
            body["kis"]["environment"].as_str().unwrap_or("unknown")
        )),
        _ => lines.push("⚠️  KIS API: 미설정 (KIS_APP_KEY / KIS_APP_SECRET 필요)".to_string()),
    }

    if let (Some(in_flight), Some(queued)) = (
        body["rate_limiter"]["in_flight"].as_u64(),
        body["rate_limiter"]["queued"].as_u64(),
    ) {
        lines.push(format!("   호출 제한기: 실행 {} / 대기 {}", in_flight, queued));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_describe_ready() {
        let body = json!({
            "status": "ready",
            "kis": {"configured": true, "environment": "real"},
            "rate_limiter": {"in_flight": 2, "queued": 5}
        });
        let text = describe_health(true, &body);
        assert!(text.contains("서버: 정상"));
        assert!(text.contains("real"));
        assert!(text.contains("실행 2 / 대기 5"));
    }

    #[test]
    fn test_describe_unconfigured() {
        let body = json!({"status": "not_ready", "kis": {"configured": false}});
        let text = describe_health(false, &body);
        assert!(text.contains("준비되지 않음"));
        assert!(text.contains("미설정"));
        assert!(!text.contains("호출 제한기"));
    }
}
