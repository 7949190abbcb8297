use std::sync::Arc;
use std::thread;

use hft_logger::{Logger, LoggerConfig};

#[test]
fn test_concurrent_producers_drop_accounting_balances() {
    const N_PRODUCERS: usize = 4;
    const ITEMS_PER_PRODUCER: usize = 1_000;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trades.log");
    let config = LoggerConfig::default()
        .with_queue_capacity(1024)
        .with_spin_before_wait(0);
    let logger = Arc::new(Logger::new(&path, config));

    let mut handles = vec![];
    for producer_id in 0..N_PRODUCERS {
        let logger = Arc::clone(&logger);
        handles.push(thread::spawn(move || {
            for i in 0..ITEMS_PER_PRODUCER {
                logger.info(&format!("producer {producer_id} item {i}"));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let mut logger = Arc::try_unwrap(logger).unwrap_or_else(|_| panic!("producers still hold the logger"));
    logger.shutdown();

    let stats = logger.stats();
    assert_eq!(
        stats.records_written + stats.records_dropped,
        (N_PRODUCERS * ITEMS_PER_PRODUCER) as u64
    );

    let contents = std::fs::read_to_string(&path).unwrap();
    // Every data line (as opposed to the two `[LOGGER_CONFIG]`/`[SELF_TEST]`
    // startup lines) parses under the documented
    // `[sec.nanos][LEVEL][Ttid] message` format.
    let data_lines: Vec<&str> = contents.lines().filter(|line| line.contains("][T")).collect();
    assert_eq!(data_lines.len() as u64, stats.records_written);
}

#[test]
fn test_log_lines_parse_under_documented_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trades.log");
    let mut logger = Logger::new(&path, LoggerConfig::default().with_spin_before_wait(0));
    logger.info("order accepted");
    logger.warn("latency spike");
    logger.error("reject: bad symbol");
    logger.shutdown();

    let contents = std::fs::read_to_string(&path).unwrap();
    let mut data_lines = contents
        .lines()
        .filter(|line| line.contains("][T"))
        .collect::<Vec<_>>();
    data_lines.sort();

    assert_eq!(data_lines.len(), 3);
    for line in &data_lines {
        let after_timestamp = line.strip_prefix('[').expect("line starts with [sec.nanos]");
        let (timestamp, rest) = after_timestamp.split_once("][").expect("timestamp bracket");
        assert!(timestamp.contains('.'), "timestamp {timestamp} missing fractional seconds");
        let (level, rest) = rest.split_once("][").expect("level bracket");
        assert_eq!(level.len(), 5, "level label {level} must be 5 chars");
        let (tid_field, message) = rest.split_once("] ").expect("thread-id bracket");
        assert!(tid_field.starts_with('T'), "thread field {tid_field} must start with T");
        assert!(!message.is_empty());
    }
}
