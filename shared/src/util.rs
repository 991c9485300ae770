/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 获取当前 UTC 时间戳（秒）
///
/// Commands and events carry unix seconds on the wire.
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Partition key used for everything that belongs to one wallet.
pub fn wallet_key(wallet_id: i64) -> String {
    format!("wallet-{}", wallet_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_key_format() {
        assert_eq!(wallet_key(42), "wallet-42");
    }

    #[test]
    fn test_secs_and_millis_agree() {
        let secs = now_secs();
        let millis = now_millis();
        assert!((millis / 1000 - secs).abs() <= 1);
    }
}
