use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ResourceKind {
    Containers,
    Images,
    Volumes,
    Networks,
}

impl ResourceKind {
    pub const ALL: [Self; 4] = [Self::Containers, Self::Images, Self::Volumes, Self::Networks];

    pub fn title(self) -> &'static str {
        match self {
            Self::Containers => "Containers",
            Self::Images => "Images",
            Self::Volumes => "Volumes",
            Self::Networks => "Networks",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            Self::Containers => "container",
            Self::Images => "image",
            Self::Volumes => "volume",
            Self::Networks => "network",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::Containers => 0,
            Self::Images => 1,
            Self::Volumes => 2,
            Self::Networks => 3,
        }
    }

    /// Filters offered in this tab, `All` first.
    pub fn filters(self) -> &'static [ListFilter] {
        match self {
            Self::Containers => &[ListFilter::All, ListFilter::Running],
            Self::Images => &[
                ListFilter::All,
                ListFilter::InUse,
                ListFilter::Unused,
                ListFilter::Dangling,
            ],
            Self::Volumes | Self::Networks => {
                &[ListFilter::All, ListFilter::InUse, ListFilter::Unused]
            }
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum ListFilter {
    #[default]
    All,
    Running,
    InUse,
    Unused,
    Dangling,
}

impl ListFilter {
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Running => "Running",
            Self::InUse => "In use",
            Self::Unused => "Unused",
            Self::Dangling => "Dangling",
        }
    }
}

/// Sort priority of a record inside its tab. Lower sorts first.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Tier {
    Active,
    Inactive,
    Dangling,
}

pub trait Record {
    fn id(&self) -> &str;
    fn display_name(&self) -> String;
    fn tier(&self) -> Tier;

    fn matches(&self, filter: ListFilter) -> bool {
        match filter {
            ListFilter::All => true,
            ListFilter::Running | ListFilter::InUse => self.tier() == Tier::Active,
            ListFilter::Unused => self.tier() != Tier::Active,
            ListFilter::Dangling => self.tier() == Tier::Dangling,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ContainerState {
    Running,
    Paused,
    Restarting,
    Created,
    Exited,
    Dead,
    Unknown,
}

impl ContainerState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "created" => Self::Created,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }

    /// Whether the container has a live process (stop/restart/console are legal).
    pub fn is_up(self) -> bool {
        matches!(self, Self::Running | Self::Paused | Self::Restarting)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Created => "created",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PortBinding {
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: ContainerState,
    pub status: String,
    pub ports: Vec<PortBinding>,
    pub created: String,
    pub cpu_percent: Option<f64>,
    pub memory_percent: Option<f64>,
    pub memory_usage: Option<String>,
}

impl ContainerRecord {
    /// Published TCP host ports, sorted and deduplicated.
    pub fn published_ports(&self) -> Vec<u16> {
        let mut ports = self
            .ports
            .iter()
            .filter(|binding| binding.protocol == "tcp")
            .filter_map(|binding| binding.host_port)
            .collect::<Vec<_>>();
        ports.sort_unstable();
        ports.dedup();
        ports
    }

    pub fn ports_summary(&self) -> String {
        if self.ports.is_empty() {
            return "-".to_string();
        }
        let mut parts = self
            .ports
            .iter()
            .map(|binding| match binding.host_port {
                Some(host) => format!("{host}->{}/{}", binding.container_port, binding.protocol),
                None => format!("{}/{}", binding.container_port, binding.protocol),
            })
            .collect::<Vec<_>>();
        parts.dedup();
        parts.join(", ")
    }
}

impl Record for ContainerRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn tier(&self) -> Tier {
        match self.state {
            state if state.is_up() => Tier::Active,
            ContainerState::Dead => Tier::Dangling,
            _ => Tier::Inactive,
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ImageRecord {
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub size: String,
    pub created: String,
    pub in_use: bool,
}

impl ImageRecord {
    pub fn is_dangling(&self) -> bool {
        self.repository == "<none>" || self.tag == "<none>"
    }

    /// The reference other commands accept: `repo:tag`, or the id for dangling images.
    pub fn reference(&self) -> String {
        if self.is_dangling() {
            short_id(&self.id).to_string()
        } else {
            format!("{}:{}", self.repository, self.tag)
        }
    }
}

impl Record for ImageRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> String {
        self.reference()
    }

    fn tier(&self) -> Tier {
        if self.in_use {
            Tier::Active
        } else if self.is_dangling() {
            Tier::Dangling
        } else {
            Tier::Inactive
        }
    }

    fn matches(&self, filter: ListFilter) -> bool {
        match filter {
            ListFilter::All => true,
            ListFilter::Running | ListFilter::InUse => self.in_use,
            ListFilter::Unused => !self.in_use,
            ListFilter::Dangling => self.is_dangling(),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VolumeRecord {
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
    pub in_use: bool,
}

impl Record for VolumeRecord {
    fn id(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn tier(&self) -> Tier {
        if self.in_use {
            Tier::Active
        } else {
            Tier::Inactive
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
    pub containers: usize,
}

impl Record for NetworkRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn tier(&self) -> Tier {
        if self.containers > 0 {
            Tier::Active
        } else {
            Tier::Inactive
        }
    }
}

/// One freshly fetched collection, replacing the previous one wholesale.
#[derive(Debug, Clone, PartialEq)]
pub enum Collection {
    Containers(Vec<ContainerRecord>),
    Images(Vec<ImageRecord>),
    Volumes(Vec<VolumeRecord>),
    Networks(Vec<NetworkRecord>),
}

impl Collection {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Containers(_) => ResourceKind::Containers,
            Self::Images(_) => ResourceKind::Images,
            Self::Volumes(_) => ResourceKind::Volumes,
            Self::Networks(_) => ResourceKind::Networks,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Containers(rows) => rows.len(),
            Self::Images(rows) => rows.len(),
            Self::Volumes(rows) => rows.len(),
            Self::Networks(rows) => rows.len(),
        }
    }
}

/// Reference to the record an action or detail view is about.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Target {
    pub kind: ResourceKind,
    pub id: String,
    pub name: String,
}

impl Target {
    pub fn of<R: Record>(kind: ResourceKind, record: &R) -> Self {
        Self {
            kind,
            id: record.id().to_string(),
            name: record.display_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MutateOp {
    Start,
    Stop,
    Restart,
    Delete,
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct CreateSpec {
    pub image: String,
    pub name: Option<String>,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub env: Vec<String>,
}

pub fn short_id(id: &str) -> &str {
    let id = id.strip_prefix("sha256:").unwrap_or(id);
    match id.char_indices().nth(12) {
        Some((index, _)) => &id[..index],
        None => id,
    }
}
