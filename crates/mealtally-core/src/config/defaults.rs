use std::collections::BTreeMap;

pub(super) fn default_bot_name() -> String {
    "订餐机器人".to_string()
}
pub(super) fn default_self_sender() -> String {
    "self".to_string()
}
pub(super) fn default_data_dir() -> String {
    "~/.mealtally".to_string()
}
pub(super) fn default_log_level() -> String {
    "info".to_string()
}
pub(super) fn default_poll_interval() -> u64 {
    10
}
pub(super) fn default_error_backoff() -> u64 {
    30
}
pub(super) fn default_io_timeout() -> u64 {
    15
}
pub(super) fn default_send_retry_delay() -> u64 {
    1000
}
pub(super) fn default_summary_time() -> String {
    "16:00".to_string()
}
pub(super) fn default_summary_window() -> u32 {
    5
}
pub(super) fn default_heartbeat_ticks() -> u64 {
    6
}
pub(super) fn default_ledger_dir() -> String {
    "~/.mealtally/ledger".to_string()
}
pub(super) fn default_inbox_dir() -> String {
    "~/.mealtally/transcripts/inbox".to_string()
}
pub(super) fn default_outbox_dir() -> String {
    "~/.mealtally/transcripts/outbox".to_string()
}
pub(super) fn default_history_depth() -> usize {
    100
}
pub(super) fn default_groups() -> BTreeMap<String, String> {
    BTreeMap::from([("英明中、晚饭订餐群".to_string(), "布鲁布鲁".to_string())])
}
