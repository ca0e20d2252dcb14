use crate::dispatch::ResourceClient;
use crate::error::{ClientError, ClientResult};
use crate::model::{
    Collection, ContainerRecord, ContainerState, CreateSpec, ImageRecord, MutateOp,
    NetworkRecord, PortBinding, ResourceKind, Target, VolumeRecord,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::process::Stdio;
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

const JSON_FORMAT: &str = "{{json .}}";

/// Talks to the engine through the `docker` CLI, one process per call.
#[derive(Debug, Clone)]
pub struct DockerGateway {
    bin: String,
    host: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct PsRow {
    #[serde(rename = "ID")]
    id: String,
    names: String,
    image: String,
    state: String,
    status: String,
    ports: String,
    created_at: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct StatsRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "CPUPerc")]
    cpu_perc: String,
    mem_perc: String,
    mem_usage: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct ImageRow {
    #[serde(rename = "ID")]
    id: String,
    repository: String,
    tag: String,
    size: String,
    created_since: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct VolumeRow {
    name: String,
    driver: String,
    mountpoint: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct NetworkRow {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    driver: String,
    scope: String,
}

impl DockerGateway {
    pub fn new(bin: impl Into<String>, host: Option<String>) -> Self {
        Self {
            bin: bin.into(),
            host,
        }
    }

    fn command(&self) -> TokioCommand {
        let mut cmd = TokioCommand::new(&self.bin);
        if let Some(host) = &self.host {
            cmd.arg("-H").arg(host);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    async fn output(&self, args: &[String]) -> ClientResult<std::process::Output> {
        debug!("docker args={args:?}");
        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|error| ClientError::Transport(format!("failed to run {}: {error}", self.bin)))?;

        if output.status.success() {
            Ok(output)
        } else {
            Err(rejection(&output))
        }
    }

    async fn run(&self, args: &[String]) -> ClientResult<String> {
        let output = self.output(args).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn list<T: DeserializeOwned>(&self, args: &[&str]) -> ClientResult<Vec<T>> {
        let mut args = to_args(args);
        args.push("--format".to_string());
        args.push(JSON_FORMAT.to_string());
        let stdout = self.run(&args).await?;
        parse_json_lines(&stdout)
    }

    async fn containers(&self) -> ClientResult<Vec<ContainerRecord>> {
        let rows = self.list::<PsRow>(&["ps", "-a", "--no-trunc"]).await?;
        let mut records = rows.into_iter().map(container_from_row).collect::<Vec<_>>();

        if records.iter().any(|record| record.state.is_up()) {
            match self
                .list::<StatsRow>(&["stats", "--no-stream", "--no-trunc"])
                .await
            {
                Ok(stats) => apply_stats(&mut records, &stats),
                Err(error) => warn!("container stats unavailable: {error}"),
            }
        }

        Ok(records)
    }

    async fn container_images(&self) -> ClientResult<Vec<String>> {
        let rows = self.list::<PsRow>(&["ps", "-a", "--no-trunc"]).await?;
        Ok(rows.into_iter().map(|row| row.image).collect())
    }

    async fn images(&self) -> ClientResult<Vec<ImageRecord>> {
        let rows = self.list::<ImageRow>(&["images", "--no-trunc"]).await?;
        let used = self.container_images().await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let in_use = image_in_use(&row.id, &row.repository, &row.tag, &used);
                ImageRecord {
                    id: row.id,
                    repository: row.repository,
                    tag: row.tag,
                    size: row.size,
                    created: row.created_since,
                    in_use,
                }
            })
            .collect())
    }

    async fn volumes(&self) -> ClientResult<Vec<VolumeRecord>> {
        let rows = self.list::<VolumeRow>(&["volume", "ls"]).await?;
        let mounts = self
            .run(&to_args(&["ps", "-a", "--no-trunc", "--format", "{{.Mounts}}"]))
            .await?;
        let mounted = mounted_names(&mounts);
        Ok(rows
            .into_iter()
            .map(|row| VolumeRecord {
                in_use: mounted.contains(row.name.as_str()),
                name: row.name,
                driver: row.driver,
                mountpoint: row.mountpoint,
            })
            .collect())
    }

    async fn networks(&self) -> ClientResult<Vec<NetworkRecord>> {
        let rows = self.list::<NetworkRow>(&["network", "ls", "--no-trunc"]).await?;
        let counts = if rows.is_empty() {
            HashMap::new()
        } else {
            let mut args = to_args(&["network", "inspect"]);
            args.extend(rows.iter().map(|row| row.id.clone()));
            match self.run(&args).await {
                Ok(stdout) => attached_counts(&stdout)?,
                Err(error) => {
                    warn!("network inspect failed: {error}");
                    HashMap::new()
                }
            }
        };
        Ok(rows
            .into_iter()
            .map(|row| NetworkRecord {
                containers: counts.get(&row.id).copied().unwrap_or(0),
                id: row.id,
                name: row.name,
                driver: row.driver,
                scope: row.scope,
            })
            .collect())
    }
}

impl ResourceClient for DockerGateway {
    fn fetch(&self, kind: ResourceKind) -> BoxFuture<'_, ClientResult<Collection>> {
        async move {
            let collection = match kind {
                ResourceKind::Containers => Collection::Containers(self.containers().await?),
                ResourceKind::Images => Collection::Images(self.images().await?),
                ResourceKind::Volumes => Collection::Volumes(self.volumes().await?),
                ResourceKind::Networks => Collection::Networks(self.networks().await?),
            };
            debug!("fetched {} {}", collection.len(), kind.title());
            Ok(collection)
        }
        .boxed()
    }

    fn mutate<'a>(&'a self, target: &'a Target, op: MutateOp) -> BoxFuture<'a, ClientResult<()>> {
        async move {
            let args = mutate_args(target, op)?;
            self.run(&args).await.map(|_| ())
        }
        .boxed()
    }

    fn fetch_logs<'a>(&'a self, id: &'a str, tail: usize) -> BoxFuture<'a, ClientResult<String>> {
        async move {
            let args = to_args(&["logs", "--tail", &tail.to_string(), id]);
            let output = self.output(&args).await?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            Ok(match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
                (_, true) => stdout.into_owned(),
                (true, false) => stderr.into_owned(),
                (false, false) => format!("{stdout}{stderr}"),
            })
        }
        .boxed()
    }

    fn inspect<'a>(
        &'a self,
        kind: ResourceKind,
        id: &'a str,
    ) -> BoxFuture<'a, ClientResult<serde_json::Value>> {
        async move {
            let subcommand = match kind {
                ResourceKind::Containers => "container",
                ResourceKind::Images => "image",
                ResourceKind::Volumes => "volume",
                ResourceKind::Networks => "network",
            };
            let stdout = self.run(&to_args(&[subcommand, "inspect", id])).await?;
            parse_inspect(&stdout)
        }
        .boxed()
    }

    fn create<'a>(&'a self, spec: &'a CreateSpec) -> BoxFuture<'a, ClientResult<String>> {
        async move {
            let stdout = self.run(&create_args(spec)).await?;
            Ok(stdout.trim().to_string())
        }
        .boxed()
    }

    fn pull<'a>(&'a self, reference: &'a str) -> BoxFuture<'a, ClientResult<()>> {
        async move {
            self.run(&to_args(&["pull", "--quiet", reference]))
                .await
                .map(|_| ())
        }
        .boxed()
    }

    fn open_console<'a>(&'a self, id: &'a str) -> BoxFuture<'a, ClientResult<()>> {
        async move {
            let status = self
                .command()
                .args(["exec", "-it", id, "sh"])
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(|error| {
                    ClientError::Transport(format!("failed to run {}: {error}", self.bin))
                })?;
            if status.success() {
                Ok(())
            } else {
                Err(ClientError::Rejected(format!("console exited with {status}")))
            }
        }
        .boxed()
    }

    fn ping(&self) -> BoxFuture<'_, ClientResult<String>> {
        async move {
            let stdout = self
                .run(&to_args(&["version", "--format", "{{.Server.Version}}"]))
                .await?;
            Ok(stdout.trim().to_string())
        }
        .boxed()
    }
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| (*arg).to_string()).collect()
}

fn rejection(output: &std::process::Output) -> ClientError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let message = stderr
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("Error response from daemon: ").to_string())
        .unwrap_or_else(|| format!("exited with {}", output.status));
    ClientError::Rejected(message)
}

fn parse_json_lines<T: DeserializeOwned>(stdout: &str) -> ClientResult<Vec<T>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str(line).map_err(|error| ClientError::Malformed(error.to_string()))
        })
        .collect()
}

/// `docker inspect` always prints an array; a single-object view reads better.
fn parse_inspect(stdout: &str) -> ClientResult<serde_json::Value> {
    let value = serde_json::from_str::<serde_json::Value>(stdout)
        .map_err(|error| ClientError::Malformed(error.to_string()))?;
    Ok(match value {
        serde_json::Value::Array(mut items) if items.len() == 1 => items.remove(0),
        other => other,
    })
}

fn container_from_row(row: PsRow) -> ContainerRecord {
    let name = row
        .names
        .split(',')
        .next()
        .unwrap_or_default()
        .trim_start_matches('/')
        .to_string();
    ContainerRecord {
        id: row.id,
        name,
        image: row.image,
        state: ContainerState::parse(&row.state),
        status: row.status,
        ports: parse_ports(&row.ports),
        created: row.created_at,
        cpu_percent: None,
        memory_percent: None,
        memory_usage: None,
    }
}

fn apply_stats(records: &mut [ContainerRecord], stats: &[StatsRow]) {
    for record in records.iter_mut() {
        let Some(row) = stats
            .iter()
            .find(|row| !row.id.is_empty() && record.id.starts_with(&row.id))
        else {
            continue;
        };
        record.cpu_percent = parse_percent(&row.cpu_perc);
        record.memory_percent = parse_percent(&row.mem_perc);
        record.memory_usage = Some(row.mem_usage.clone()).filter(|usage| !usage.is_empty());
    }
}

fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').parse::<f64>().ok()
}

/// Parses the `Ports` column of `docker ps`, e.g.
/// `0.0.0.0:8080->80/tcp, :::8080->80/tcp, 443/tcp`.
fn parse_ports(raw: &str) -> Vec<PortBinding> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .flat_map(parse_port_entry)
        .collect()
}

fn parse_port_entry(entry: &str) -> Vec<PortBinding> {
    let (mapping, protocol) = entry.rsplit_once('/').unwrap_or((entry, "tcp"));
    let protocol = protocol.to_string();

    let Some((host, container)) = mapping.split_once("->") else {
        return parse_port_range(mapping)
            .into_iter()
            .map(|container_port| PortBinding {
                host_ip: None,
                host_port: None,
                container_port,
                protocol: protocol.clone(),
            })
            .collect();
    };

    let Some((host_ip, host_ports)) = host.rsplit_once(':') else {
        return Vec::new();
    };
    let host_ip = host_ip.trim_start_matches('[').trim_end_matches(']');
    let host_ip = if host_ip.is_empty() { "::" } else { host_ip };

    parse_port_range(host_ports)
        .into_iter()
        .zip(parse_port_range(container))
        .map(|(host_port, container_port)| PortBinding {
            host_ip: Some(host_ip.to_string()),
            host_port: Some(host_port),
            container_port,
            protocol: protocol.clone(),
        })
        .collect()
}

fn parse_port_range(raw: &str) -> Vec<u16> {
    match raw.split_once('-') {
        Some((start, end)) => match (start.parse::<u16>(), end.parse::<u16>()) {
            (Ok(start), Ok(end)) if start <= end => (start..=end).collect(),
            _ => Vec::new(),
        },
        None => raw.parse::<u16>().into_iter().collect(),
    }
}

/// Whether any container was created from this image. Containers reference
/// images by `repo:tag`, bare `repo` (implying `latest`) or an id prefix.
fn image_in_use(id: &str, repository: &str, tag: &str, container_images: &[String]) -> bool {
    let bare_id = id.strip_prefix("sha256:").unwrap_or(id);
    let reference = format!("{repository}:{tag}");
    container_images.iter().any(|image| {
        let image = image.as_str();
        if repository != "<none>"
            && tag != "<none>"
            && (image == reference || (tag == "latest" && image == repository))
        {
            return true;
        }
        let image_id = image.strip_prefix("sha256:").unwrap_or(image);
        image_id.len() >= 12 && bare_id.starts_with(image_id)
    })
}

fn mounted_names(stdout: &str) -> HashSet<&str> {
    stdout
        .lines()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Attached container count per network id from a `network inspect` array.
fn attached_counts(stdout: &str) -> ClientResult<HashMap<String, usize>> {
    let value = serde_json::from_str::<serde_json::Value>(stdout)
        .map_err(|error| ClientError::Malformed(error.to_string()))?;
    let Some(networks) = value.as_array() else {
        return Err(ClientError::Malformed(
            "network inspect did not return an array".to_string(),
        ));
    };
    Ok(networks
        .iter()
        .filter_map(|network| {
            let id = network.get("Id")?.as_str()?.to_string();
            let count = network
                .get("Containers")
                .and_then(serde_json::Value::as_object)
                .map_or(0, |containers| containers.len());
            Some((id, count))
        })
        .collect())
}

fn mutate_args(target: &Target, op: MutateOp) -> ClientResult<Vec<String>> {
    let args = match (target.kind, op) {
        (ResourceKind::Containers, MutateOp::Start) => ["start", target.id.as_str()].to_vec(),
        (ResourceKind::Containers, MutateOp::Stop) => ["stop", target.id.as_str()].to_vec(),
        (ResourceKind::Containers, MutateOp::Restart) => ["restart", target.id.as_str()].to_vec(),
        (ResourceKind::Containers, MutateOp::Delete) => ["rm", "-f", target.id.as_str()].to_vec(),
        (ResourceKind::Images, MutateOp::Delete) => ["rmi", target.id.as_str()].to_vec(),
        (ResourceKind::Volumes, MutateOp::Delete) => ["volume", "rm", target.id.as_str()].to_vec(),
        (ResourceKind::Networks, MutateOp::Delete) => {
            ["network", "rm", target.id.as_str()].to_vec()
        }
        (kind, op) => {
            return Err(ClientError::Unsupported(format!(
                "{op:?} is not available for {}",
                kind.title().to_lowercase()
            )));
        }
    };
    Ok(to_args(&args))
}

fn create_args(spec: &CreateSpec) -> Vec<String> {
    let mut args = to_args(&["run", "-d"]);
    if let Some(name) = &spec.name {
        args.push("--name".to_string());
        args.push(name.clone());
    }
    for (flag, values) in [("-p", &spec.ports), ("-v", &spec.volumes), ("-e", &spec.env)] {
        for value in values {
            args.push(flag.to_string());
            args.push(value.clone());
        }
    }
    args.push(spec.image.clone());
    args
}

#[cfg(test)]
mod tests {
    use super::{
        PsRow, StatsRow, apply_stats, attached_counts, container_from_row, create_args,
        image_in_use, mounted_names, mutate_args, parse_inspect, parse_json_lines, parse_percent,
        parse_ports,
    };
    use crate::error::ClientError;
    use crate::model::{ContainerState, CreateSpec, MutateOp, ResourceKind, Target};

    #[test]
    fn parses_ps_json_lines_into_records() {
        let stdout = concat!(
            r#"{"ID":"aaa111","Names":"web","Image":"nginx:latest","State":"running","Status":"Up 2 hours","Ports":"0.0.0.0:8080->80/tcp, :::8080->80/tcp","CreatedAt":"2024-05-01 10:00:00 +0000 UTC","Mounts":"data"}"#,
            "\n",
            r#"{"ID":"bbb222","Names":"job","Image":"alpine","State":"exited","Status":"Exited (0) 1 day ago","Ports":"","CreatedAt":"2024-04-01 10:00:00 +0000 UTC","Mounts":""}"#,
            "\n\n"
        );
        let rows = parse_json_lines::<PsRow>(stdout).expect("valid rows");
        let records = rows.into_iter().map(container_from_row).collect::<Vec<_>>();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "web");
        assert_eq!(records[0].state, ContainerState::Running);
        assert_eq!(records[0].published_ports(), vec![8080]);
        assert_eq!(records[1].state, ContainerState::Exited);
        assert!(records[1].ports.is_empty());
    }

    #[test]
    fn malformed_json_line_is_reported() {
        let error = parse_json_lines::<PsRow>("{not json").expect_err("must fail");
        assert!(matches!(error, ClientError::Malformed(_)));
    }

    #[test]
    fn ports_cover_ranges_unpublished_and_bracketed_ipv6() {
        let ports = parse_ports("0.0.0.0:8000-8001->9000-9001/tcp, 443/tcp, [::]:5353->53/udp");
        assert_eq!(ports.len(), 4);
        assert_eq!(ports[0].host_port, Some(8000));
        assert_eq!(ports[1].container_port, 9001);
        assert_eq!(ports[2].host_port, None);
        assert_eq!(ports[2].container_port, 443);
        assert_eq!(ports[3].host_ip.as_deref(), Some("::"));
        assert_eq!(ports[3].protocol, "udp");
    }

    #[test]
    fn stats_are_matched_by_id_prefix() {
        let mut records = vec![container_from_row(PsRow {
            id: "abcdef0123456789".to_string(),
            names: "web".to_string(),
            state: "running".to_string(),
            ..Default::default()
        })];
        let stats = vec![StatsRow {
            id: "abcdef012345".to_string(),
            cpu_perc: "12.50%".to_string(),
            mem_perc: "3.1%".to_string(),
            mem_usage: "20MiB / 1GiB".to_string(),
        }];
        apply_stats(&mut records, &stats);
        assert_eq!(records[0].cpu_percent, Some(12.5));
        assert_eq!(records[0].memory_usage.as_deref(), Some("20MiB / 1GiB"));
        assert_eq!(parse_percent("--"), None);
    }

    #[test]
    fn image_usage_matches_tag_bare_repo_and_id() {
        let used = vec![
            "nginx".to_string(),
            "redis:7".to_string(),
            "0123456789ab".to_string(),
        ];
        assert!(image_in_use("sha256:ffff", "nginx", "latest", &used));
        assert!(image_in_use("sha256:eeee", "redis", "7", &used));
        assert!(!image_in_use("sha256:dddd", "redis", "6", &used));
        assert!(image_in_use(
            "sha256:0123456789abcdef",
            "<none>",
            "<none>",
            &used
        ));
        assert!(!image_in_use("sha256:cccc", "<none>", "<none>", &used));
    }

    #[test]
    fn mounts_column_lists_volume_names() {
        let mounted = mounted_names("data,cache\n\nlogs\n");
        assert!(mounted.contains("cache"));
        assert!(mounted.contains("logs"));
        assert_eq!(mounted.len(), 3);
    }

    #[test]
    fn network_counts_come_from_containers_map() {
        let stdout = r#"[
            {"Id": "n1", "Containers": {"c1": {}, "c2": {}}},
            {"Id": "n2", "Containers": {}},
            {"Id": "n3"}
        ]"#;
        let counts = attached_counts(stdout).expect("valid inspect");
        assert_eq!(counts.get("n1"), Some(&2));
        assert_eq!(counts.get("n2"), Some(&0));
        assert_eq!(counts.get("n3"), Some(&0));
    }

    #[test]
    fn inspect_unwraps_single_element_array() {
        let value = parse_inspect(r#"[{"Id":"abc"}]"#).expect("valid json");
        assert_eq!(value["Id"], "abc");
        assert!(matches!(parse_inspect("oops"), Err(ClientError::Malformed(_))));
    }

    #[test]
    fn mutate_args_per_kind() {
        let target = |kind| Target {
            kind,
            id: "x1".to_string(),
            name: "x".to_string(),
        };
        assert_eq!(
            mutate_args(&target(ResourceKind::Containers), MutateOp::Stop),
            Ok(vec!["stop".to_string(), "x1".to_string()])
        );
        assert_eq!(
            mutate_args(&target(ResourceKind::Volumes), MutateOp::Delete),
            Ok(vec!["volume".to_string(), "rm".to_string(), "x1".to_string()])
        );
        assert!(matches!(
            mutate_args(&target(ResourceKind::Images), MutateOp::Start),
            Err(ClientError::Unsupported(_))
        ));
    }

    #[test]
    fn create_args_keep_flag_order_and_image_last() {
        let spec = CreateSpec {
            image: "nginx:latest".to_string(),
            name: Some("web".to_string()),
            ports: vec!["8080:80".to_string()],
            volumes: vec!["data:/data".to_string()],
            env: vec!["MODE=prod".to_string()],
        };
        assert_eq!(
            create_args(&spec),
            vec![
                "run", "-d", "--name", "web", "-p", "8080:80", "-v", "data:/data", "-e",
                "MODE=prod", "nginx:latest"
            ]
        );
    }
}
