use super::*;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use mealtally_core::message::{Message, MessageId};
use std::sync::atomic::AtomicU64;
use std::sync::Mutex as StdMutex;

static COUNTER: AtomicU64 = AtomicU64::new(0);

const GROUP: &str = "订餐群";
const OTHER: &str = "二号群";

fn temp_dir() -> std::path::PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!(
        "__mealtally_gateway_test_{}_{n}__",
        std::process::id()
    ));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[derive(Default)]
struct FakeState {
    chats: HashMap<String, Vec<Message>>,
    selected: Option<String>,
    sent: Vec<(String, String)>,
    send_failures: u32,
    missing: Vec<String>,
}

#[derive(Clone, Default)]
struct FakeStream {
    inner: Arc<StdMutex<FakeState>>,
}

impl FakeStream {
    fn push(&self, group: &str, id: u64, sender: &str, content: &str) {
        self.inner
            .lock()
            .unwrap()
            .chats
            .entry(group.to_string())
            .or_default()
            .push(Message::new(Some(MessageId::from(id)), sender, content, ""));
    }

    fn push_message(&self, group: &str, msg: Message) {
        self.inner
            .lock()
            .unwrap()
            .chats
            .entry(group.to_string())
            .or_default()
            .push(msg);
    }

    fn sent(&self) -> Vec<(String, String)> {
        self.inner.lock().unwrap().sent.clone()
    }

    fn fail_sends(&self, n: u32) {
        self.inner.lock().unwrap().send_failures = n;
    }

    fn hide(&self, group: &str) {
        self.inner.lock().unwrap().missing.push(group.to_string());
    }
}

#[async_trait]
impl MessageStream for FakeStream {
    fn name(&self) -> &str {
        "fake"
    }

    async fn select_chat(&self, group: &str) -> Result<bool, TallyError> {
        let mut state = self.inner.lock().unwrap();
        if state.missing.iter().any(|g| g == group) {
            return Ok(false);
        }
        state.selected = Some(group.to_string());
        Ok(true)
    }

    async fn fetch_messages(&self) -> Result<Vec<Message>, TallyError> {
        let state = self.inner.lock().unwrap();
        let group = state.selected.clone().unwrap_or_default();
        Ok(state.chats.get(&group).cloned().unwrap_or_default())
    }

    async fn send_message(&self, text: &str, group: &str) -> Result<(), TallyError> {
        let mut state = self.inner.lock().unwrap();
        if state.send_failures > 0 {
            state.send_failures -= 1;
            return Err(TallyError::Send("window lost focus".into()));
        }
        state.sent.push((group.to_string(), text.to_string()));
        Ok(())
    }
}

struct FixedClock(StdMutex<NaiveDateTime>);

impl FixedClock {
    fn at(h: u32, m: u32) -> Arc<Self> {
        Arc::new(Self(StdMutex::new(day().and_hms_opt(h, m, 0).unwrap())))
    }

    fn set(&self, t: NaiveDateTime) {
        *self.0.lock().unwrap() = t;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock().unwrap()
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

fn config(groups: &[&str]) -> Config {
    let mut cfg = Config::default();
    cfg.groups = groups
        .iter()
        .map(|g| (g.to_string(), "布鲁布鲁".to_string()))
        .collect();
    cfg.bot.name = "BotName".into();
    cfg.bot.self_sender = "self".into();
    cfg.scheduler.send_retry_delay_ms = 1;
    cfg.scheduler.io_timeout_secs = 1;
    cfg
}

struct Harness {
    gateway: Gateway,
    stream: FakeStream,
    clock: Arc<FixedClock>,
    ledger: Arc<LedgerStore>,
    dir: std::path::PathBuf,
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

fn harness_with(cfg: Config, clock: Arc<FixedClock>) -> Harness {
    let dir = temp_dir();
    let ledger = Arc::new(LedgerStore::new(&dir).unwrap());
    let stream = FakeStream::default();
    let gateway = Gateway::new(
        &cfg,
        Box::new(stream.clone()),
        ledger.clone(),
        clock.clone(),
    )
    .unwrap();
    Harness {
        gateway,
        stream,
        clock,
        ledger,
        dir,
    }
}

fn harness(groups: &[&str]) -> Harness {
    harness_with(config(groups), FixedClock::at(11, 0))
}

fn ledger_rows(h: &Harness, group: &str) -> Vec<(String, String, u32)> {
    h.ledger
        .read_day(group, day())
        .unwrap()
        .unwrap_or_default()
        .into_iter()
        .map(|r| (r.sender, r.description, r.declared_count))
        .collect()
}

#[tokio::test]
async fn test_first_tick_only_seeds() {
    let mut h = harness(&[GROUP]);
    h.stream.push(GROUP, 1, "张三", "红烧肉，共1份");
    h.stream.push(GROUP, 2, "李四", "@BotName 多少份");

    h.gateway.tick().await.unwrap();

    assert_eq!(h.gateway.tracker.phase(GROUP), Phase::Polling);
    assert!(ledger_rows(&h, GROUP).is_empty());
    assert!(h.stream.sent().is_empty());
}

#[tokio::test]
async fn test_new_orders_are_persisted_once() {
    let mut h = harness(&[GROUP]);
    for id in 3..=5 {
        h.stream.push(GROUP, id, "旧人", &format!("旧单{id}，共1份"));
    }
    h.gateway.tick().await.unwrap();

    h.stream.push(GROUP, 6, "张三", "红烧肉，共2份");
    h.stream.push(GROUP, 7, "李四 王五", "李四 王五，共2人");
    h.gateway.tick().await.unwrap();
    h.gateway.tick().await.unwrap();

    let rows = ledger_rows(&h, GROUP);
    assert_eq!(
        rows,
        vec![
            ("张三".to_string(), "红烧肉".to_string(), 2),
            ("李四 王五".to_string(), "李四 王五".to_string(), 2),
        ]
    );
    assert_eq!(
        h.gateway.tracker.baseline(GROUP),
        Some(&MessageId::from(7))
    );
}

#[tokio::test]
async fn test_bot_and_summary_messages_never_become_orders() {
    let mut h = harness(&[GROUP]);
    h.gateway.tick().await.unwrap();

    h.stream.push(GROUP, 1, "self", "红烧肉，共9份");
    h.stream
        .push(GROUP, 2, "张三", "2026-10-18订餐群订餐汇总：共2人订餐，3份");
    h.stream.push(GROUP, 3, "李四", "米饭，共1份");
    h.gateway.tick().await.unwrap();

    assert_eq!(
        ledger_rows(&h, GROUP),
        vec![("李四".to_string(), "米饭".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_orders_from_another_day_are_skipped() {
    let mut h = harness(&[GROUP]);
    h.gateway.tick().await.unwrap();

    h.stream.push_message(
        GROUP,
        Message::new(Some(MessageId::from(1)), "张三", "饭，共1份", "昨天 18:00"),
    );
    h.stream.push_message(
        GROUP,
        Message::new(
            Some(MessageId::from(2)),
            "李四",
            "面，共1份",
            "2026-10-18 10:59:00",
        ),
    );
    h.gateway.tick().await.unwrap();

    let rows = ledger_rows(&h, GROUP);
    assert_eq!(rows, vec![("李四".to_string(), "面".to_string(), 1)]);
}

#[tokio::test]
async fn test_mention_answered_once_from_ledger() {
    let mut h = harness(&[GROUP]);
    h.gateway.tick().await.unwrap();

    h.stream.push(GROUP, 1, "张三", "红烧肉，共2份");
    h.stream.push(GROUP, 2, "李四", "@BotName 今天多少份");
    h.gateway.tick().await.unwrap();
    h.gateway.tick().await.unwrap();

    let sent = h.stream.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, GROUP);
    assert_eq!(sent[0].1, "@李四 2026-10-18订餐群订餐汇总：共1人订餐，2份");
    assert!(!h.gateway.state(GROUP, day()).summarized_on(day()));
}

#[tokio::test]
async fn test_unidentified_mention_is_not_answered() {
    let mut h = harness(&[GROUP]);
    h.gateway.tick().await.unwrap();

    h.stream
        .push_message(GROUP, Message::new(None, "李四", "@BotName 汇总", ""));
    h.gateway.tick().await.unwrap();

    assert!(h.stream.sent().is_empty());
}

#[tokio::test]
async fn test_scheduled_summary_once_per_day() {
    let mut h = harness(&[GROUP]);
    h.gateway.tick().await.unwrap();
    h.stream.push(GROUP, 1, "张三", "红烧肉，共2份");
    h.stream.push(GROUP, 2, "李四", "米饭，共1份");
    h.gateway.tick().await.unwrap();

    h.clock.set(day().and_hms_opt(16, 0, 10).unwrap());
    h.gateway.tick().await.unwrap();
    h.clock.set(day().and_hms_opt(16, 3, 0).unwrap());
    h.gateway.tick().await.unwrap();

    let sent = h.stream.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].1,
        "@布鲁布鲁 2026-10-18订餐群订餐汇总：共2人订餐，3份"
    );
    assert!(h.gateway.state(GROUP, day()).summarized_on(day()));

    // Next day the flag resets.
    let tomorrow = day().succ_opt().unwrap();
    h.clock.set(tomorrow.and_hms_opt(16, 1, 0).unwrap());
    h.gateway.tick().await.unwrap();
    let sent = h.stream.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].1, "@布鲁布鲁 没有找到订餐信息");
}

#[tokio::test]
async fn test_scheduled_summary_outside_window_does_nothing() {
    let mut h = harness_with(config(&[GROUP]), FixedClock::at(16, 6));
    h.gateway.tick().await.unwrap();
    h.gateway.tick().await.unwrap();
    assert!(h.stream.sent().is_empty());
}

#[tokio::test]
async fn test_failed_scheduled_send_leaves_flag_unset() {
    let mut h = harness_with(config(&[GROUP]), FixedClock::at(16, 1));
    h.stream.fail_sends(2);

    let result = h.gateway.tick().await;
    assert!(result.is_err());
    assert!(!h.gateway.state(GROUP, day()).summarized_on(day()));

    h.gateway.tick().await.unwrap();
    assert_eq!(h.stream.sent().len(), 1);
    assert!(h.gateway.state(GROUP, day()).summarized_on(day()));
}

#[tokio::test]
async fn test_send_retries_once() {
    let mut h = harness_with(config(&[GROUP]), FixedClock::at(16, 1));
    h.stream.fail_sends(1);
    h.gateway.tick().await.unwrap();
    assert_eq!(h.stream.sent().len(), 1);
}

#[tokio::test]
async fn test_scheduled_summary_falls_back_to_ledger() {
    let mut h = harness_with(config(&[GROUP]), FixedClock::at(16, 2));
    let prior = crate::orders::parse_order("张三 李四 王五，共2人")
        .unwrap()
        .into_record("王五", "");
    h.ledger.merge_day(GROUP, day(), &[prior]).unwrap();

    h.gateway.tick().await.unwrap();

    let sent = h.stream.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1, "@布鲁布鲁 2026-10-18订餐群订餐汇总：共3人");
}

#[tokio::test]
async fn test_ledger_write_failure_keeps_baseline() {
    let mut h = harness(&[GROUP]);
    h.stream.push(GROUP, 5, "张三", "hi");
    h.gateway.tick().await.unwrap();

    // A directory where the month file should be makes the write fail.
    let month = h.ledger.month_path(GROUP, day());
    std::fs::create_dir_all(&month).unwrap();
    h.stream.push(GROUP, 6, "李四", "米饭，共1份");
    assert!(h.gateway.tick().await.is_err());
    assert_eq!(
        h.gateway.tracker.baseline(GROUP),
        Some(&MessageId::from(5))
    );

    std::fs::remove_dir_all(&month).unwrap();
    h.gateway.tick().await.unwrap();
    assert_eq!(
        ledger_rows(&h, GROUP),
        vec![("李四".to_string(), "米饭".to_string(), 1)]
    );
    assert_eq!(
        h.gateway.tracker.baseline(GROUP),
        Some(&MessageId::from(6))
    );
}

#[tokio::test]
async fn test_group_failures_are_isolated() {
    let mut h = harness(&[GROUP, OTHER]);
    h.stream.hide(OTHER);
    h.gateway.tick().await.unwrap();

    h.stream.push(GROUP, 1, "张三", "饭，共1份");
    h.gateway.tick().await.unwrap();

    assert_eq!(ledger_rows(&h, GROUP).len(), 1);
    assert_eq!(h.gateway.tracker.phase(OTHER), Phase::AwaitingBaseline);
}

#[tokio::test]
async fn test_all_groups_failing_is_a_tick_error() {
    let mut h = harness(&[GROUP, OTHER]);
    h.stream.hide(GROUP);
    h.stream.hide(OTHER);
    let err = h.gateway.tick().await.unwrap_err();
    assert!(matches!(err, TallyError::StreamUnavailable(_)));
}

#[tokio::test]
async fn test_reprocess_startup_ingests_history_without_replying() {
    let mut cfg = config(&[GROUP]);
    cfg.scheduler.startup_mode = mealtally_core::config::StartupMode::Reprocess;
    let mut h = harness_with(cfg, FixedClock::at(11, 0));
    h.stream.push(GROUP, 1, "张三", "红烧肉，共1份");
    h.stream.push(GROUP, 2, "李四", "@BotName 多少份");

    h.gateway.tick().await.unwrap();
    h.gateway.tick().await.unwrap();

    assert_eq!(ledger_rows(&h, GROUP).len(), 1);
    assert!(h.stream.sent().is_empty());
}

#[tokio::test]
async fn test_summarize_now_does_not_set_flag() {
    let mut h = harness_with(config(&[GROUP, OTHER]), FixedClock::at(12, 0));
    assert_eq!(h.gateway.summarize_now(None).await.unwrap(), 2);
    assert_eq!(h.gateway.summarize_now(Some(GROUP)).await.unwrap(), 1);
    assert!(h.gateway.summarize_now(Some("不存在")).await.is_err());
    assert!(!h.gateway.state(GROUP, day()).summarized_on(day()));
    assert_eq!(h.stream.sent().len(), 3);
}

#[tokio::test]
async fn test_run_stops_on_handle() {
    let mut cfg = config(&[GROUP]);
    cfg.scheduler.poll_interval_secs = 3600;
    let dir = temp_dir();
    let stream = FakeStream::default();
    let gateway = Gateway::new(
        &cfg,
        Box::new(stream.clone()),
        Arc::new(LedgerStore::new(&dir).unwrap()),
        FixedClock::at(11, 0),
    )
    .unwrap();
    let handle = gateway.handle();
    let task = tokio::spawn(gateway.run());

    handle.request_summary(Some(GROUP.to_string())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.stop();

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stream.sent().len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_scheduled_summary_after_restart_counts_whole_ledger() {
    let mut h = harness(&[GROUP]);
    let earlier = crate::orders::parse_order("红烧肉，共2份")
        .unwrap()
        .into_record("张三", "2026-10-18 09:00:00");
    h.ledger.merge_day(GROUP, day(), &[earlier]).unwrap();

    // Fresh process: only orders seen since startup are held in memory.
    h.gateway.tick().await.unwrap();
    h.stream.push(GROUP, 1, "李四", "米饭，共1份");
    h.gateway.tick().await.unwrap();

    h.clock.set(day().and_hms_opt(16, 1, 0).unwrap());
    h.gateway.tick().await.unwrap();

    let sent = h.stream.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].1,
        "@布鲁布鲁 2026-10-18订餐群订餐汇总：共2人订餐，3份"
    );
}

#[tokio::test]
async fn test_summary_uses_memory_when_ledger_unreadable() {
    let mut h = harness(&[GROUP]);
    h.gateway.tick().await.unwrap();
    h.stream.push(GROUP, 1, "李四", "米饭，共1份");
    h.gateway.tick().await.unwrap();

    std::fs::write(h.ledger.month_path(GROUP, day()), "{ not json").unwrap();
    assert_eq!(h.gateway.summarize_now(Some(GROUP)).await.unwrap(), 1);

    assert_eq!(
        h.stream.sent()[0].1,
        "@布鲁布鲁 2026-10-18订餐群订餐汇总：共1人订餐，1份"
    );
}

#[tokio::test]
async fn test_trailing_unidentified_order_is_merged_once() {
    let mut h = harness(&[GROUP]);
    h.gateway.tick().await.unwrap();

    h.stream.push(GROUP, 1, "张三", "hi");
    h.stream
        .push_message(GROUP, Message::new(None, "李四", "米饭，共1份", ""));
    h.gateway.tick().await.unwrap();
    assert_eq!(ledger_rows(&h, GROUP).len(), 1);

    // The unidentified message is diffed again on every tick; once held in
    // memory it must not reach the ledger a second time.
    let month = h.ledger.month_path(GROUP, day());
    std::fs::remove_file(&month).unwrap();
    h.gateway.tick().await.unwrap();
    h.gateway.tick().await.unwrap();
    assert!(!month.exists());
}
