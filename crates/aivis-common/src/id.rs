use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Install the process-wide snowflake generator. Call once at startup;
/// `machine_id` and `node_id` are both in 0-31.
pub fn init(machine_id: i32, node_id: i32) {
    *GENERATOR.lock().unwrap() = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// A fresh snowflake ID, rendered as a decimal string. Falls back to a
/// (1, 1) generator when `init` was never called, which only happens in
/// tests.
pub fn next_id() -> String {
    GENERATOR
        .lock()
        .unwrap()
        .get_or_insert_with(|| SnowflakeIdBucket::new(1, 1))
        .get_id()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique_and_non_empty() {
        init(1, 1);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = next_id();
            assert!(!id.is_empty());
            assert!(seen.insert(id), "duplicate id");
        }
    }
}
