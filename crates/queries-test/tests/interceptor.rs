use async_trait::async_trait;
use queries::driver::{
    Conn, ConnBeginTx, ConnPrepareContext, ExecResult, ExecerContext, NamedValue, QueryerContext,
    Rows, Stmt, Tx,
};
use queries::{
    BeginTxHook, Capability, Context, Db, DbError, DbResult, Driver, ExecHook, Interceptor,
    PrepareHook, QueryHook, StatsHook, TxOptions, Value, registry,
};
use queries_test::{TestDriver, TestResult, TestRows, new_db};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Barrier;

#[derive(Debug, thiserror::Error)]
#[error("sentinel from {0} hook")]
struct Sentinel(&'static str);

fn is_sentinel(err: &DbError, from: &str) -> bool {
    err.downcast_ref::<Sentinel>()
        .is_some_and(|sentinel| sentinel.0 == from)
}

/// One observed call: (operation, query, args, caller).
type Call = (&'static str, String, Vec<Value>, Option<String>);

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<Call>>,
    fail: bool,
}

impl Recorder {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn record(&self, op: &'static str, ctx: &Context, query: &str, args: &[NamedValue]) {
        let values = args.iter().map(|arg| arg.value.clone()).collect();
        let caller = ctx.value("caller").map(str::to_string);
        self.calls
            .lock()
            .unwrap()
            .push((op, query.to_string(), values, caller));
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecHook for Recorder {
    async fn exec(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
        execer: &dyn ExecerContext,
    ) -> DbResult<Box<dyn ExecResult>> {
        self.record("exec", ctx, query, args);
        let result = execer.exec_context(ctx, query, args).await;
        if self.fail {
            return Err(DbError::driver(Sentinel("exec")));
        }
        result
    }
}

#[async_trait]
impl QueryHook for Recorder {
    async fn query(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
        queryer: &dyn QueryerContext,
    ) -> DbResult<Box<dyn Rows>> {
        self.record("query", ctx, query, args);
        let result = queryer.query_context(ctx, query, args).await;
        if self.fail {
            return Err(DbError::driver(Sentinel("query")));
        }
        result
    }
}

#[async_trait]
impl PrepareHook for Recorder {
    async fn prepare(
        &self,
        ctx: &Context,
        query: &str,
        preparer: &dyn ConnPrepareContext,
    ) -> DbResult<Box<dyn Stmt>> {
        self.record("prepare", ctx, query, &[]);
        preparer.prepare_context(ctx, query).await
    }
}

#[async_trait]
impl BeginTxHook for Recorder {
    async fn begin_tx(
        &self,
        ctx: &Context,
        opts: TxOptions,
        beginner: &dyn ConnBeginTx,
    ) -> DbResult<Box<dyn Tx>> {
        self.record("begin_tx", ctx, "BEGIN", &[]);
        beginner.begin_tx(ctx, opts).await
    }
}

fn recording_driver(seen: Arc<Mutex<Vec<String>>>) -> TestDriver {
    let exec_seen = seen.clone();
    TestDriver::new()
        .with_exec(move |query, _args| {
            exec_seen.lock().unwrap().push(query.to_string());
            Ok(Box::new(TestResult::new(0, 1)))
        })
        .with_query(move |query, _args| {
            seen.lock().unwrap().push(query.to_string());
            Ok(Box::new(TestRows::new(["n"]).add([1])))
        })
}

#[tokio::test]
async fn test_hooks_see_calls_and_their_results_reach_the_caller() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::new(Recorder::failing());
    let interceptor = Interceptor::new(recording_driver(seen.clone()))
        .with_exec_hook_arc(recorder.clone())
        .with_query_hook_arc(recorder.clone());
    let db = new_db("interceptor_sentinel", interceptor).unwrap();
    let ctx = Context::background();

    let err = db
        .exec(&ctx, "UPDATE t SET a = ?", &[Value::Int(7)])
        .await
        .err()
        .unwrap();
    assert!(is_sentinel(&err, "exec"), "{err}");

    let err = db
        .query(&ctx, "SELECT n FROM t WHERE a = ?", &["x".into()])
        .await
        .err()
        .unwrap();
    assert!(is_sentinel(&err, "query"), "{err}");

    assert_eq!(
        recorder.calls(),
        vec![
            ("exec", "UPDATE t SET a = ?".to_string(), vec![Value::Int(7)], None),
            (
                "query",
                "SELECT n FROM t WHERE a = ?".to_string(),
                vec![Value::Text("x".into())],
                None
            ),
        ]
    );
    // The driver itself ran once per operation.
    assert_eq!(
        *seen.lock().unwrap(),
        ["UPDATE t SET a = ?", "SELECT n FROM t WHERE a = ?"]
    );
}

#[tokio::test]
async fn test_pass_through_results_are_unchanged() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::new(Recorder::default());
    let interceptor = Interceptor::new(recording_driver(seen))
        .with_exec_hook_arc(recorder.clone())
        .with_query_hook_arc(recorder.clone());
    let db = new_db("interceptor_pass_through", interceptor).unwrap();
    let ctx = Context::background();

    let result = db.exec(&ctx, "DELETE FROM t", &[]).await.unwrap();
    assert_eq!(result.rows_affected().unwrap(), 1);

    let n: i64 = queries::query_row(&db, &ctx, "SELECT n FROM t", &[])
        .await
        .unwrap();
    assert_eq!(n, 1);
    assert_eq!(recorder.calls().len(), 2);
    assert_eq!(db.idle_count(), 1);
}

/// A connection with only the mandatory operations.
struct BareConn;

#[async_trait]
impl Conn for BareConn {
    async fn prepare(&self, _query: &str) -> DbResult<Box<dyn Stmt>> {
        Err(DbError::Other("bare: legacy prepare".into()))
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }

    async fn begin(&self) -> DbResult<Box<dyn Tx>> {
        Err(DbError::Other("bare: legacy begin".into()))
    }
}

struct BareDriver;

#[async_trait]
impl Driver for BareDriver {
    async fn open(&self, _name: &str) -> DbResult<Box<dyn Conn>> {
        Ok(Box::new(BareConn))
    }
}

#[tokio::test]
async fn test_connection_without_capabilities() {
    let recorder = Arc::new(Recorder::default());
    let interceptor = Interceptor::new(BareDriver).with_hooks(recorder.clone());
    registry::register("interceptor_bare", interceptor).unwrap();
    let db = Db::open("interceptor_bare", "").unwrap();
    let ctx = Context::background();

    // Exec and query skip their fast path, then the prepare fallback has
    // nothing to call.
    let err = db.exec(&ctx, "DELETE FROM t", &[]).await.err().unwrap();
    assert!(matches!(err, DbError::Unsupported(Capability::Prepare)), "{err}");
    let err = db.query(&ctx, "SELECT 1", &[]).await.err().unwrap();
    assert!(matches!(err, DbError::Unsupported(Capability::Prepare)), "{err}");

    let err = db.ping(&ctx).await.err().unwrap();
    assert!(matches!(err, DbError::Unsupported(Capability::Ping)), "{err}");
    let err = db.begin(&ctx).await.err().unwrap();
    assert!(matches!(err, DbError::Unsupported(Capability::BeginTx)), "{err}");

    assert!(recorder.calls().is_empty());
}

/// Prepares statements but cannot execute directly.
struct PreparingConn {
    log: Arc<Mutex<Vec<String>>>,
}

struct LoggedStmt {
    query: String,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Stmt for LoggedStmt {
    async fn close(&self) -> DbResult<()> {
        self.log.lock().unwrap().push(format!("close {}", self.query));
        Ok(())
    }

    async fn exec(&self, _ctx: &Context, args: &[NamedValue]) -> DbResult<Box<dyn ExecResult>> {
        self.log
            .lock()
            .unwrap()
            .push(format!("exec {} with {} args", self.query, args.len()));
        Ok(Box::new(TestResult::new(9, 3)))
    }

    async fn query(&self, _ctx: &Context, args: &[NamedValue]) -> DbResult<Box<dyn Rows>> {
        self.log.lock().unwrap().push(format!("query {}", self.query));
        Ok(Box::new(TestRows::new(["n"]).add([args.len() as i64])))
    }
}

#[async_trait]
impl Conn for PreparingConn {
    async fn prepare(&self, _query: &str) -> DbResult<Box<dyn Stmt>> {
        Err(DbError::Other("legacy prepare must not be used".into()))
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }

    async fn begin(&self) -> DbResult<Box<dyn Tx>> {
        Err(DbError::Other("no transactions".into()))
    }

    fn as_preparer(&self) -> Option<&dyn ConnPrepareContext> {
        Some(self)
    }
}

#[async_trait]
impl ConnPrepareContext for PreparingConn {
    async fn prepare_context(&self, _ctx: &Context, query: &str) -> DbResult<Box<dyn Stmt>> {
        self.log.lock().unwrap().push(format!("prepare {query}"));
        Ok(Box::new(LoggedStmt {
            query: query.to_string(),
            log: self.log.clone(),
        }))
    }
}

struct PreparingDriver {
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Driver for PreparingDriver {
    async fn open(&self, _name: &str) -> DbResult<Box<dyn Conn>> {
        Ok(Box::new(PreparingConn {
            log: self.log.clone(),
        }))
    }
}

#[tokio::test]
async fn test_exec_fallback_goes_through_prepare_hook() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::new(Recorder::default());
    let stats = Arc::new(StatsHook::new());
    let interceptor = Interceptor::new(PreparingDriver { log: log.clone() })
        .with_exec_hook_arc(recorder.clone())
        .with_prepare_hook_arc(recorder.clone());
    let db = new_db("interceptor_fallback", interceptor).unwrap();
    let ctx = Context::background();

    let result = db
        .exec(&ctx, "INSERT INTO t VALUES (?)", &[Value::Int(1)])
        .await
        .unwrap();
    assert_eq!(result.last_insert_id().unwrap(), 9);
    assert_eq!(result.rows_affected().unwrap(), 3);

    // The exec hook never ran: the connection has no direct exec.
    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "prepare");
    assert_eq!(calls[0].1, "INSERT INTO t VALUES (?)");
    assert_eq!(
        *log.lock().unwrap(),
        [
            "prepare INSERT INTO t VALUES (?)",
            "exec INSERT INTO t VALUES (?) with 1 args",
            "close INSERT INTO t VALUES (?)",
        ]
    );

    let interceptor = Interceptor::new(PreparingDriver { log }).with_hooks(stats.clone());
    let db = new_db("interceptor_fallback_stats", interceptor).unwrap();
    db.exec(&ctx, "DELETE FROM t", &[]).await.unwrap();
    let snapshot = stats.stats();
    assert_eq!(snapshot.exec.calls, 0);
    assert_eq!(snapshot.prepare.calls, 1);
    assert_eq!(snapshot.prepare.failed, 0);
}

#[tokio::test]
async fn test_query_fallback_goes_through_prepare_hook() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::new(Recorder::default());
    let interceptor = Interceptor::new(PreparingDriver { log: log.clone() })
        .with_query_hook_arc(recorder.clone())
        .with_prepare_hook_arc(recorder.clone());
    let db = new_db("interceptor_query_fallback", interceptor).unwrap();
    let ctx = Context::background();

    let mut rows = db
        .query(&ctx, "SELECT n FROM t WHERE a = ?", &[Value::Int(5)])
        .await
        .unwrap();
    assert_eq!(
        *log.lock().unwrap(),
        [
            "prepare SELECT n FROM t WHERE a = ?",
            "query SELECT n FROM t WHERE a = ?",
        ]
    );
    let n: i64 = queries::scan_row(&mut rows).await.unwrap();
    assert_eq!(n, 1);
    assert_eq!(
        log.lock().unwrap().last().map(String::as_str),
        Some("close SELECT n FROM t WHERE a = ?")
    );

    // Only the prepare hook ran: the connection has no direct query.
    let calls = recorder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "prepare");
    assert_eq!(calls[0].1, "SELECT n FROM t WHERE a = ?");
    assert_eq!(db.idle_count(), 1);
}

/// Executes only once both callers are inside the driver, so each caller
/// holds its own connection while the other runs.
struct RendezvousDriver {
    opened: Arc<AtomicUsize>,
    barrier: Arc<Barrier>,
    /// (connection, caller, query, args) as seen by the driver.
    seen: Arc<Mutex<Vec<(usize, Option<String>, String, Vec<Value>)>>>,
}

struct RendezvousConn {
    id: usize,
    barrier: Arc<Barrier>,
    seen: Arc<Mutex<Vec<(usize, Option<String>, String, Vec<Value>)>>>,
}

#[async_trait]
impl Driver for RendezvousDriver {
    async fn open(&self, _name: &str) -> DbResult<Box<dyn Conn>> {
        let id = self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RendezvousConn {
            id,
            barrier: self.barrier.clone(),
            seen: self.seen.clone(),
        }))
    }
}

#[async_trait]
impl Conn for RendezvousConn {
    async fn prepare(&self, _query: &str) -> DbResult<Box<dyn Stmt>> {
        Err(DbError::Other("not supported".into()))
    }

    async fn close(&self) -> DbResult<()> {
        Ok(())
    }

    async fn begin(&self) -> DbResult<Box<dyn Tx>> {
        Err(DbError::Other("not supported".into()))
    }

    fn as_execer(&self) -> Option<&dyn ExecerContext> {
        Some(self)
    }
}

#[async_trait]
impl ExecerContext for RendezvousConn {
    async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[NamedValue],
    ) -> DbResult<Box<dyn ExecResult>> {
        self.barrier.wait().await;
        self.seen.lock().unwrap().push((
            self.id,
            ctx.value("caller").map(str::to_string),
            query.to_string(),
            args.iter().map(|arg| arg.value.clone()).collect(),
        ));
        Ok(Box::new(TestResult::new(0, 1)))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_callers_are_told_apart_by_context() {
    let recorder = Arc::new(Recorder::default());
    let driver = RendezvousDriver {
        opened: Arc::default(),
        barrier: Arc::new(Barrier::new(2)),
        seen: Arc::default(),
    };
    let seen = driver.seen.clone();
    let opened = driver.opened.clone();
    let interceptor = Interceptor::new(driver).with_exec_hook_arc(recorder.clone());
    let db = new_db("interceptor_concurrent", interceptor).unwrap();

    let base = Context::background();
    let ctx_a = base.with_value("caller", "a");
    let ctx_b = base.with_value("caller", "b");
    let (a, b) = tokio::time::timeout(
        Duration::from_secs(5),
        futures_util::future::join(
            db.exec(&ctx_a, "UPDATE a SET x = ?", &[Value::Int(1)]),
            db.exec(&ctx_b, "UPDATE b SET x = ?", &[Value::Int(2)]),
        ),
    )
    .await
    .expect("callers did not meet inside the driver");
    a.unwrap();
    b.unwrap();

    // Two physical connections, both returned for reuse.
    assert_eq!(opened.load(Ordering::SeqCst), 2);
    assert_eq!(db.idle_count(), 2);

    let mut calls = recorder.calls();
    calls.sort_by(|x, y| x.3.cmp(&y.3));
    assert_eq!(
        calls,
        vec![
            (
                "exec",
                "UPDATE a SET x = ?".to_string(),
                vec![Value::Int(1)],
                Some("a".to_string())
            ),
            (
                "exec",
                "UPDATE b SET x = ?".to_string(),
                vec![Value::Int(2)],
                Some("b".to_string())
            ),
        ]
    );

    let mut seen = seen.lock().unwrap().clone();
    seen.sort_by(|x, y| x.1.cmp(&y.1));
    assert_eq!(seen.len(), 2);
    assert_ne!(seen[0].0, seen[1].0, "callers shared a connection");
    assert_eq!(
        (seen[0].1.as_deref(), seen[0].2.as_str(), &seen[0].3[..]),
        (Some("a"), "UPDATE a SET x = ?", &[Value::Int(1)][..])
    );
    assert_eq!(
        (seen[1].1.as_deref(), seen[1].2.as_str(), &seen[1].3[..]),
        (Some("b"), "UPDATE b SET x = ?", &[Value::Int(2)][..])
    );
}

#[tokio::test]
async fn test_db_reports_the_wrapped_driver() {
    let interceptor = Interceptor::new(TestDriver::new());
    let wrapped = interceptor.driver().clone();
    let db = new_db("interceptor_driver", interceptor).unwrap();

    assert!(std::ptr::addr_eq(
        Arc::as_ptr(&db.driver()),
        Arc::as_ptr(&wrapped)
    ));
}

#[tokio::test]
async fn test_unset_closure_is_reported() {
    let db = new_db("interceptor_unset", Interceptor::new(TestDriver::new())).unwrap();
    let err = db
        .exec(&Context::background(), "DELETE FROM t", &[])
        .await
        .err()
        .unwrap();
    assert!(err.to_string().contains("TestDriver.exec is not set"), "{err}");
}
