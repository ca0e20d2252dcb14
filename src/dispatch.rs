//! Turns [`Command`] values into tasks and reports every outcome as one [`Message`].

use crate::error::{ClientError, ClientResult};
use crate::message::{Command, DeadlineClass, Message};
use crate::model::{Collection, CreateSpec, MutateOp, ResourceKind, Target};
use futures::future::BoxFuture;
use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command as TokioCommand;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{Duration, sleep, timeout};
use tracing::{debug, warn};

/// One engine operation per call. Implementations do not apply deadlines;
/// the dispatcher bounds every call except interactive consoles.
pub trait ResourceClient: Send + Sync {
    fn fetch(&self, kind: ResourceKind) -> BoxFuture<'_, ClientResult<Collection>>;

    fn mutate<'a>(&'a self, target: &'a Target, op: MutateOp) -> BoxFuture<'a, ClientResult<()>>;

    fn fetch_logs<'a>(&'a self, id: &'a str, tail: usize) -> BoxFuture<'a, ClientResult<String>>;

    fn inspect<'a>(
        &'a self,
        kind: ResourceKind,
        id: &'a str,
    ) -> BoxFuture<'a, ClientResult<serde_json::Value>>;

    /// Starts a detached container and returns its id.
    fn create<'a>(&'a self, spec: &'a CreateSpec) -> BoxFuture<'a, ClientResult<String>>;

    fn pull<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, ClientResult<()>>;

    /// Runs an interactive shell attached to the current terminal.
    fn open_console<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ClientResult<()>>;

    /// Server version, used as the startup connectivity check.
    fn ping(&self) -> BoxFuture<'_, ClientResult<String>>;
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Deadlines {
    pub short: Duration,
    pub medium: Duration,
    pub long: Duration,
}

impl Default for Deadlines {
    fn default() -> Self {
        Self {
            short: Duration::from_secs(10),
            medium: Duration::from_secs(30),
            long: Duration::from_secs(600),
        }
    }
}

impl Deadlines {
    pub fn for_class(&self, class: DeadlineClass) -> Duration {
        match class {
            DeadlineClass::Short => self.short,
            DeadlineClass::Medium => self.medium,
            DeadlineClass::Long => self.long,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    client: Arc<dyn ResourceClient>,
    deadlines: Deadlines,
    tx: UnboundedSender<Message>,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn ResourceClient>,
        deadlines: Deadlines,
        tx: UnboundedSender<Message>,
    ) -> Self {
        Self {
            client,
            deadlines,
            tx,
        }
    }

    pub fn client(&self) -> &Arc<dyn ResourceClient> {
        &self.client
    }

    pub fn deadlines(&self) -> Deadlines {
        self.deadlines
    }

    /// Fire and forget. The result arrives later through the message queue.
    pub fn spawn(&self, command: Command) {
        debug!("dispatch command={command:?}");
        let client = Arc::clone(&self.client);
        let deadlines = self.deadlines;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let message = execute(client.as_ref(), deadlines, command).await;
            if tx.send(message).is_err() {
                debug!("message queue closed, dropping command result");
            }
        });
    }
}

/// Runs one command to completion. Always produces exactly one message.
pub async fn execute(
    client: &dyn ResourceClient,
    deadlines: Deadlines,
    command: Command,
) -> Message {
    let limit = command
        .deadline_class()
        .map(|class| deadlines.for_class(class));

    if let Some(action) = command.pending_action() {
        let result = run_action(client, limit, command).await;
        return Message::ActionDone { action, result };
    }

    match command {
        Command::Fetch(kind) => Message::Fetched {
            kind,
            result: bounded(limit, client.fetch(kind)).await,
        },
        Command::FetchLogs { target, tail } => Message::LogsLoaded {
            result: bounded(limit, client.fetch_logs(&target.id, tail)).await,
            target_id: target.id,
        },
        Command::Inspect { target } => {
            let result = bounded(limit, client.inspect(target.kind, &target.id))
                .await
                .and_then(|value| {
                    serde_json::to_string_pretty(&value)
                        .map_err(|error| ClientError::Malformed(error.to_string()))
                });
            Message::Inspected {
                target_id: target.id,
                result,
            }
        }
        Command::OpenUrl { url } => Message::UrlOpened {
            result: bounded(limit, open_url(&url)).await,
            url,
        },
        Command::ScheduleTick(delay) => {
            sleep(delay).await;
            Message::Tick
        }
        Command::Mutate { .. }
        | Command::Create { .. }
        | Command::Pull { .. }
        | Command::Console { .. } => unreachable!("mutating commands describe a pending action"),
    }
}

/// Success text is the id or reference the action was about.
async fn run_action(
    client: &dyn ResourceClient,
    limit: Option<Duration>,
    command: Command,
) -> ClientResult<String> {
    match command {
        Command::Mutate { target, op } => bounded(limit, client.mutate(&target, op))
            .await
            .map(|()| target.id),
        Command::Create { spec } => bounded(limit, client.create(&spec)).await,
        Command::Pull { reference } => bounded(limit, client.pull(&reference))
            .await
            .map(|()| reference),
        Command::Console { target } => client.open_console(&target.id).await.map(|()| target.id),
        other => Err(ClientError::Unsupported(format!("{other:?} is not an action"))),
    }
}

async fn bounded<T>(
    limit: Option<Duration>,
    future: impl Future<Output = ClientResult<T>>,
) -> ClientResult<T> {
    let Some(limit) = limit else {
        return future.await;
    };
    match timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => {
            warn!("client call timed out after {limit:?}");
            Err(ClientError::TimedOut(limit))
        }
    }
}

fn opener_program() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

async fn open_url(url: &str) -> ClientResult<()> {
    let status = TokioCommand::new(opener_program())
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|error| {
            ClientError::Transport(format!("failed to run {}: {error}", opener_program()))
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(ClientError::Rejected(format!(
            "{} exited with {status}",
            opener_program()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::{Deadlines, Dispatcher, ResourceClient, execute};
    use crate::error::{ClientError, ClientResult};
    use crate::message::{ActionOp, Command, Message};
    use crate::model::{Collection, CreateSpec, MutateOp, ResourceKind, Target, VolumeRecord};
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::time::{Duration, sleep};

    struct FakeClient {
        mutate_delay: Duration,
        fail_logs: bool,
    }

    impl FakeClient {
        fn quick() -> Self {
            Self {
                mutate_delay: Duration::ZERO,
                fail_logs: false,
            }
        }
    }

    impl ResourceClient for FakeClient {
        fn fetch(&self, _kind: ResourceKind) -> BoxFuture<'_, ClientResult<Collection>> {
            async {
                Ok(Collection::Volumes(vec![VolumeRecord {
                    name: "data".to_string(),
                    driver: "local".to_string(),
                    mountpoint: "/var/lib/docker/volumes/data".to_string(),
                    in_use: true,
                }]))
            }
            .boxed()
        }

        fn mutate<'a>(
            &'a self,
            _target: &'a Target,
            _op: MutateOp,
        ) -> BoxFuture<'a, ClientResult<()>> {
            async move {
                sleep(self.mutate_delay).await;
                Ok(())
            }
            .boxed()
        }

        fn fetch_logs<'a>(
            &'a self,
            id: &'a str,
            tail: usize,
        ) -> BoxFuture<'a, ClientResult<String>> {
            async move {
                if self.fail_logs {
                    Err(ClientError::Rejected(format!("No such container: {id}")))
                } else {
                    Ok(format!("{tail} lines of {id}"))
                }
            }
            .boxed()
        }

        fn inspect<'a>(
            &'a self,
            _kind: ResourceKind,
            id: &'a str,
        ) -> BoxFuture<'a, ClientResult<serde_json::Value>> {
            async move { Ok(serde_json::json!({ "Id": id })) }.boxed()
        }

        fn create<'a>(&'a self, _spec: &'a CreateSpec) -> BoxFuture<'a, ClientResult<String>> {
            async { Ok("newid".to_string()) }.boxed()
        }

        fn pull<'a>(&'a self, _reference: &'a str) -> BoxFuture<'a, ClientResult<()>> {
            async { Ok(()) }.boxed()
        }

        fn open_console<'a>(&'a self, _id: &'a str) -> BoxFuture<'a, ClientResult<()>> {
            async { Ok(()) }.boxed()
        }

        fn ping(&self) -> BoxFuture<'_, ClientResult<String>> {
            async { Ok("27.0.0".to_string()) }.boxed()
        }
    }

    fn target() -> Target {
        Target {
            kind: ResourceKind::Containers,
            id: "c1".to_string(),
            name: "web".to_string(),
        }
    }

    fn tight_deadlines() -> Deadlines {
        Deadlines {
            short: Duration::from_millis(50),
            medium: Duration::from_millis(20),
            long: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn mutate_past_medium_deadline_becomes_timeout_action_result() {
        let client = FakeClient {
            mutate_delay: Duration::from_millis(500),
            fail_logs: false,
        };
        let message = execute(
            &client,
            tight_deadlines(),
            Command::Mutate {
                target: target(),
                op: MutateOp::Stop,
            },
        )
        .await;

        match message {
            Message::ActionDone { action, result } => {
                assert_eq!(action.op, ActionOp::Stop);
                assert_eq!(action.name, "web");
                assert_eq!(result, Err(ClientError::TimedOut(Duration::from_millis(20))));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_yields_fetched_for_same_kind() {
        let message = execute(
            &FakeClient::quick(),
            Deadlines::default(),
            Command::Fetch(ResourceKind::Volumes),
        )
        .await;
        match message {
            Message::Fetched { kind, result } => {
                assert_eq!(kind, ResourceKind::Volumes);
                assert_eq!(result.map(|collection| collection.len()), Ok(1));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn inspect_is_pretty_printed_and_tagged_with_target() {
        let message = execute(
            &FakeClient::quick(),
            Deadlines::default(),
            Command::Inspect { target: target() },
        )
        .await;
        match message {
            Message::Inspected { target_id, result } => {
                assert_eq!(target_id, "c1");
                assert_eq!(result, Ok("{\n  \"Id\": \"c1\"\n}".to_string()));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn log_errors_are_reported_not_dropped() {
        let client = FakeClient {
            mutate_delay: Duration::ZERO,
            fail_logs: true,
        };
        let message = execute(
            &client,
            Deadlines::default(),
            Command::FetchLogs {
                target: target(),
                tail: 50,
            },
        )
        .await;
        assert!(matches!(
            message,
            Message::LogsLoaded { ref target_id, result: Err(ClientError::Rejected(_)) } if target_id == "c1"
        ));
    }

    #[tokio::test]
    async fn spawn_delivers_exactly_one_message_per_command() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Arc::new(FakeClient::quick()), tight_deadlines(), tx);
        dispatcher.spawn(Command::Create {
            spec: CreateSpec {
                image: "nginx:latest".to_string(),
                ..Default::default()
            },
        });
        dispatcher.spawn(Command::ScheduleTick(Duration::from_millis(1)));

        let mut received = Vec::new();
        for _ in 0..2 {
            received.push(rx.recv().await.expect("message"));
        }
        assert!(received.iter().any(|message| matches!(
            message,
            Message::ActionDone { action, result: Ok(id) } if action.op == ActionOp::Create && id == "newid"
        )));
        assert!(received.iter().any(|message| matches!(message, Message::Tick)));

        drop(dispatcher);
        assert!(rx.recv().await.is_none());
    }
}
