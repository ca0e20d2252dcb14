//! View modes and the key handling each one owns.
//!
//! Every non-list mode carries its scratch state inside its [`ViewMode`]
//! variant, so leaving a mode drops that state with it.

use super::App;
use crate::input::Action;
use crate::message::Command;
use crate::model::{CreateSpec, ListFilter, MutateOp, ResourceKind, Target};
use crate::viewport::max_text_scroll;
use tracing::debug;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ModeKind {
    List,
    Logs,
    Inspect,
    PortSelector,
    DeleteConfirm,
    Filter,
    RunResource,
    Pull,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewMode {
    List,
    Logs(TextView),
    Inspect(TextView),
    PortSelector(PortSelector),
    DeleteConfirm(DeleteConfirm),
    Filter(FilterPicker),
    RunResource(RunForm),
    Pull(PullForm),
}

impl ViewMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            Self::List => ModeKind::List,
            Self::Logs(_) => ModeKind::Logs,
            Self::Inspect(_) => ModeKind::Inspect,
            Self::PortSelector(_) => ModeKind::PortSelector,
            Self::DeleteConfirm(_) => ModeKind::DeleteConfirm,
            Self::Filter(_) => ModeKind::Filter,
            Self::RunResource(_) => ModeKind::RunResource,
            Self::Pull(_) => ModeKind::Pull,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextBody {
    Loading,
    Lines(Vec<String>),
    Failed(String),
}

/// Scrollable text buffer for logs and inspect output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextView {
    pub target: Target,
    pub body: TextBody,
    pub scroll: usize,
}

impl TextView {
    fn loading(target: Target) -> Self {
        Self {
            target,
            body: TextBody::Loading,
            scroll: 0,
        }
    }

    pub fn line_count(&self) -> usize {
        match &self.body {
            TextBody::Lines(lines) => lines.len(),
            TextBody::Loading | TextBody::Failed(_) => 1,
        }
    }

    fn scroll_by(&mut self, delta: isize, height: usize) {
        let max = max_text_scroll(self.line_count(), height) as isize;
        self.scroll = (self.scroll as isize + delta).clamp(0, max) as usize;
    }

    fn scroll_to_end(&mut self, height: usize) {
        self.scroll = max_text_scroll(self.line_count(), height);
    }

    pub(super) fn clamp(&mut self, height: usize) {
        self.scroll = self.scroll.min(max_text_scroll(self.line_count(), height));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSelector {
    pub target: Target,
    pub ports: Vec<u16>,
    pub selection: usize,
}

impl PortSelector {
    pub fn url(&self) -> Option<String> {
        self.ports
            .get(self.selection)
            .map(|port| format!("http://localhost:{port}"))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum Choice {
    #[default]
    No,
    Yes,
}

impl Choice {
    fn toggled(self) -> Self {
        match self {
            Self::No => Self::Yes,
            Self::Yes => Self::No,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteConfirm {
    pub target: Target,
    pub choice: Choice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPicker {
    pub kind: ResourceKind,
    pub selection: usize,
}

impl FilterPicker {
    pub fn options(&self) -> &'static [ListFilter] {
        self.kind.filters()
    }

    fn selected(&self) -> ListFilter {
        self.options()
            .get(self.selection)
            .copied()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FormField {
    Name,
    Ports,
    Volumes,
    Env,
}

impl FormField {
    pub const ALL: [Self; 4] = [Self::Name, Self::Ports, Self::Volumes, Self::Env];

    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Ports => "Ports",
            Self::Volumes => "Volumes",
            Self::Env => "Env",
        }
    }

    pub fn hint(self) -> &'static str {
        match self {
            Self::Name => "optional container name",
            Self::Ports => "8080:80, 127.0.0.1:5432:5432/tcp",
            Self::Volumes => "data:/var/lib/data, /host/path:/app:ro",
            Self::Env => "KEY=value, OTHER=value",
        }
    }

    fn next(self) -> Self {
        match self {
            Self::Name => Self::Ports,
            Self::Ports => Self::Volumes,
            Self::Volumes => Self::Env,
            Self::Env => Self::Name,
        }
    }

    fn prev(self) -> Self {
        match self {
            Self::Name => Self::Env,
            Self::Ports => Self::Name,
            Self::Volumes => Self::Ports,
            Self::Env => Self::Volumes,
        }
    }
}

/// Form for starting a container from the selected image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunForm {
    pub image: String,
    pub name: String,
    pub ports: String,
    pub volumes: String,
    pub env: String,
    pub focus: FormField,
    pub error: Option<String>,
}

impl RunForm {
    fn new(image: String) -> Self {
        Self {
            image,
            name: String::new(),
            ports: String::new(),
            volumes: String::new(),
            env: String::new(),
            focus: FormField::Name,
            error: None,
        }
    }

    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Ports => &self.ports,
            FormField::Volumes => &self.volumes,
            FormField::Env => &self.env,
        }
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Name => &mut self.name,
            FormField::Ports => &mut self.ports,
            FormField::Volumes => &mut self.volumes,
            FormField::Env => &mut self.env,
        }
    }

    pub fn validate(&self) -> Result<CreateSpec, String> {
        let name = self.name.trim();
        if !name.is_empty() && !is_valid_container_name(name) {
            return Err(format!(
                "invalid name '{name}': use letters, digits, '_', '.' or '-'"
            ));
        }

        let ports = split_entries(&self.ports);
        if let Some(bad) = ports.iter().find(|entry| !is_valid_port_mapping(entry)) {
            return Err(format!(
                "invalid port mapping '{bad}': expected [ip:]host:container[/proto]"
            ));
        }

        let volumes = split_entries(&self.volumes);
        if let Some(bad) = volumes.iter().find(|entry| !is_valid_volume(entry)) {
            return Err(format!(
                "invalid volume '{bad}': expected source:/path[:ro|rw]"
            ));
        }

        let env = split_entries(&self.env);
        if let Some(bad) = env.iter().find(|entry| !is_valid_env(entry)) {
            return Err(format!("invalid environment entry '{bad}': expected KEY=value"));
        }

        Ok(CreateSpec {
            image: self.image.clone(),
            name: (!name.is_empty()).then(|| name.to_string()),
            ports,
            volumes,
            env,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PullForm {
    pub reference: String,
    pub error: Option<String>,
}

impl PullForm {
    pub fn validate(&self) -> Result<String, String> {
        let reference = self.reference.trim();
        if reference.is_empty() {
            return Err("image reference is required".to_string());
        }
        if reference.chars().any(char::is_whitespace) || reference.starts_with('-') {
            return Err(format!("invalid image reference '{reference}'"));
        }
        Ok(reference.to_string())
    }
}

fn split_entries(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_valid_container_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn is_valid_port_spec(raw: &str) -> bool {
    let valid = |part: &str| part.parse::<u16>().is_ok_and(|port| port > 0);
    match raw.split_once('-') {
        Some((start, end)) => valid(start) && valid(end),
        None => valid(raw),
    }
}

fn is_valid_port_mapping(entry: &str) -> bool {
    let (mapping, protocol) = entry.rsplit_once('/').unwrap_or((entry, "tcp"));
    if !matches!(protocol, "tcp" | "udp" | "sctp") {
        return false;
    }
    let parts = mapping.rsplitn(3, ':').collect::<Vec<_>>();
    match parts.as_slice() {
        [container] => is_valid_port_spec(container),
        [container, host] => is_valid_port_spec(container) && is_valid_port_spec(host),
        [container, host, ip] => {
            is_valid_port_spec(container)
                && (host.is_empty() || is_valid_port_spec(host))
                && !ip.is_empty()
        }
        _ => false,
    }
}

fn is_valid_volume(entry: &str) -> bool {
    let parts = entry.split(':').collect::<Vec<_>>();
    match parts.as_slice() {
        [path] => path.starts_with('/'),
        [source, path] => !source.is_empty() && path.starts_with('/'),
        [source, path, mode] => {
            !source.is_empty()
                && path.starts_with('/')
                && mode.split(',').all(|flag| !flag.is_empty())
        }
        _ => false,
    }
}

fn is_valid_env(entry: &str) -> bool {
    let key = entry.split_once('=').map_or(entry, |(key, _)| key);
    !key.is_empty() && !key.chars().any(char::is_whitespace)
}

impl App {
    pub(super) fn route_action(&mut self, action: Action) -> Vec<Command> {
        match self.mode.kind() {
            ModeKind::List => self.list_action(action),
            ModeKind::Logs | ModeKind::Inspect => self.text_view_action(action),
            ModeKind::PortSelector => self.port_selector_action(action),
            ModeKind::DeleteConfirm => self.delete_confirm_action(action),
            ModeKind::Filter => self.filter_action(action),
            ModeKind::RunResource => self.run_form_action(action),
            ModeKind::Pull => self.pull_form_action(action),
        }
    }

    fn list_action(&mut self, action: Action) -> Vec<Command> {
        let len = self.visible_len();
        match action {
            Action::Down => self.viewport.move_by(1, len),
            Action::Up => self.viewport.move_by(-1, len),
            Action::PageDown => self.viewport.move_by(self.viewport.page_step(), len),
            Action::PageUp => self.viewport.move_by(-self.viewport.page_step(), len),
            Action::Top => self.viewport.select_first(len),
            Action::Bottom => self.viewport.select_last(len),
            Action::NextTab => self.switch_tab((self.active_tab.index() + 1) % 4),
            Action::PrevTab => self.switch_tab((self.active_tab.index() + 3) % 4),
            Action::SelectTab(index) => self.switch_tab(index),
            Action::Refresh => {
                self.set_status(format!("Refreshing {}...", self.active_tab.title()));
                return vec![Command::Fetch(self.active_tab)];
            }
            Action::Start => return self.container_lifecycle(MutateOp::Start),
            Action::Stop => return self.container_lifecycle(MutateOp::Stop),
            Action::Restart => return self.container_lifecycle(MutateOp::Restart),
            Action::Console => return self.open_console(),
            Action::ShowLogs => return self.open_logs(),
            Action::Inspect => return self.open_inspect(),
            Action::OpenPorts => self.open_port_selector(),
            Action::Delete => match self.selected_target() {
                Some(target) => {
                    self.mode = ViewMode::DeleteConfirm(DeleteConfirm {
                        target,
                        choice: Choice::No,
                    });
                }
                None => self.set_status(format!(
                    "No {} selected",
                    self.active_tab.singular()
                )),
            },
            Action::OpenFilter => {
                let kind = self.active_tab;
                let current = self.filters[kind.index()];
                let selection = kind
                    .filters()
                    .iter()
                    .position(|filter| *filter == current)
                    .unwrap_or(0);
                self.mode = ViewMode::Filter(FilterPicker { kind, selection });
            }
            Action::RunImage => self.open_run_form(),
            Action::PullImage => {
                if self.active_tab == ResourceKind::Images {
                    self.mode = ViewMode::Pull(PullForm::default());
                } else {
                    self.set_status("Pull is only available on the Images tab");
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn switch_tab(&mut self, index: usize) {
        let Some(kind) = ResourceKind::ALL.get(index).copied() else {
            return;
        };
        if kind != self.active_tab {
            self.active_tab = kind;
            self.viewport.reset();
            self.clamp_list();
        }
    }

    fn container_lifecycle(&mut self, op: MutateOp) -> Vec<Command> {
        let label = match op {
            MutateOp::Start => "Start",
            MutateOp::Stop => "Stop",
            MutateOp::Restart => "Restart",
            MutateOp::Delete => "Delete",
        };
        if self.active_tab != ResourceKind::Containers {
            self.set_status(format!("{label} is only available for containers"));
            return Vec::new();
        }
        let Some(container) = self.selected_container() else {
            self.set_status("No container selected");
            return Vec::new();
        };
        let up = container.state.is_up();
        let target = Target::of(ResourceKind::Containers, container);

        match (op, up) {
            (MutateOp::Start, true) => {
                self.set_status(format!("{} is already running", target.name));
                Vec::new()
            }
            (MutateOp::Stop | MutateOp::Restart, false) => {
                self.set_status(format!("{} is not running", target.name));
                Vec::new()
            }
            _ => self.begin_action(Command::Mutate { target, op }),
        }
    }

    fn open_console(&mut self) -> Vec<Command> {
        if self.active_tab != ResourceKind::Containers {
            self.set_status("Console is only available for containers");
            return Vec::new();
        }
        let Some(container) = self.selected_container() else {
            self.set_status("No container selected");
            return Vec::new();
        };
        if !container.state.is_up() {
            let message = format!("{} is not running", container.name);
            self.set_status(message);
            return Vec::new();
        }
        let target = Target::of(ResourceKind::Containers, container);
        self.begin_action(Command::Console { target })
    }

    fn open_logs(&mut self) -> Vec<Command> {
        if self.active_tab != ResourceKind::Containers {
            self.set_status("Logs are only available for containers");
            return Vec::new();
        }
        let Some(target) = self.selected_target() else {
            self.set_status("No container selected");
            return Vec::new();
        };
        self.mode = ViewMode::Logs(TextView::loading(target.clone()));
        vec![Command::FetchLogs {
            target,
            tail: self.log_tail,
        }]
    }

    fn open_inspect(&mut self) -> Vec<Command> {
        let Some(target) = self.selected_target() else {
            self.set_status(format!("No {} selected", self.active_tab.singular()));
            return Vec::new();
        };
        self.mode = ViewMode::Inspect(TextView::loading(target.clone()));
        vec![Command::Inspect { target }]
    }

    fn open_port_selector(&mut self) {
        if self.active_tab != ResourceKind::Containers {
            self.set_status("Ports are only available for containers");
            return;
        }
        let Some(container) = self.selected_container() else {
            self.set_status("No container selected");
            return;
        };
        let ports = container.published_ports();
        let message = if !container.state.is_up() {
            Some(format!("{} is not running", container.name))
        } else if ports.is_empty() {
            Some(format!("{} publishes no TCP ports", container.name))
        } else {
            None
        };
        if let Some(message) = message {
            self.set_status(message);
            return;
        }
        let target = Target::of(ResourceKind::Containers, container);
        self.mode = ViewMode::PortSelector(PortSelector {
            target,
            ports,
            selection: 0,
        });
    }

    fn open_run_form(&mut self) {
        if self.active_tab != ResourceKind::Images {
            self.set_status("Run is only available on the Images tab");
            return;
        }
        match self.selected_image() {
            Some(image) => {
                let reference = image.reference();
                self.mode = ViewMode::RunResource(RunForm::new(reference));
            }
            None => self.set_status("No image selected"),
        }
    }

    fn text_view_action(&mut self, action: Action) -> Vec<Command> {
        let height = self.detail_height;
        let page = height.saturating_sub(1).max(1) as isize;
        let (ViewMode::Logs(view) | ViewMode::Inspect(view)) = &mut self.mode else {
            return Vec::new();
        };
        match action {
            Action::Down => view.scroll_by(1, height),
            Action::Up => view.scroll_by(-1, height),
            Action::PageDown => view.scroll_by(page, height),
            Action::PageUp => view.scroll_by(-page, height),
            Action::Top => view.scroll = 0,
            Action::Bottom => view.scroll_to_end(height),
            Action::Refresh => {
                let target = view.target.clone();
                return match self.mode.kind() {
                    ModeKind::Logs => vec![Command::FetchLogs {
                        target,
                        tail: self.log_tail,
                    }],
                    _ => vec![Command::Inspect { target }],
                };
            }
            Action::Back => self.mode = ViewMode::List,
            _ => {}
        }
        Vec::new()
    }

    fn port_selector_action(&mut self, action: Action) -> Vec<Command> {
        let ViewMode::PortSelector(selector) = &mut self.mode else {
            return Vec::new();
        };
        match action {
            Action::Down => {
                selector.selection =
                    (selector.selection + 1).min(selector.ports.len().saturating_sub(1));
            }
            Action::Up => selector.selection = selector.selection.saturating_sub(1),
            Action::Submit => {
                let url = selector.url();
                self.mode = ViewMode::List;
                if let Some(url) = url {
                    self.set_status(format!("Opening {url}..."));
                    return vec![Command::OpenUrl { url }];
                }
            }
            Action::Back => self.mode = ViewMode::List,
            _ => {}
        }
        Vec::new()
    }

    fn delete_confirm_action(&mut self, action: Action) -> Vec<Command> {
        let ViewMode::DeleteConfirm(confirm) = &mut self.mode else {
            return Vec::new();
        };
        match action {
            Action::ToggleChoice => confirm.choice = confirm.choice.toggled(),
            Action::ConfirmYes => confirm.choice = Choice::Yes,
            Action::ConfirmNo | Action::Back => {
                self.mode = ViewMode::List;
                self.set_status("Delete cancelled");
            }
            Action::Submit => {
                let choice = confirm.choice;
                let target = confirm.target.clone();
                self.mode = ViewMode::List;
                if choice == Choice::Yes {
                    return self.begin_action(Command::Mutate {
                        target,
                        op: MutateOp::Delete,
                    });
                }
                self.set_status("Delete cancelled");
            }
            _ => {}
        }
        Vec::new()
    }

    fn filter_action(&mut self, action: Action) -> Vec<Command> {
        let ViewMode::Filter(picker) = &mut self.mode else {
            return Vec::new();
        };
        match action {
            Action::Down => {
                picker.selection =
                    (picker.selection + 1).min(picker.options().len().saturating_sub(1));
            }
            Action::Up => picker.selection = picker.selection.saturating_sub(1),
            Action::Submit => {
                let kind = picker.kind;
                let filter = picker.selected();
                self.mode = ViewMode::List;
                self.filters[kind.index()] = filter;
                self.viewport.reset();
                self.clamp_list();
                self.set_status(format!("{} filter: {}", kind.title(), filter.label()));
            }
            Action::Back => self.mode = ViewMode::List,
            _ => {}
        }
        Vec::new()
    }

    fn run_form_action(&mut self, action: Action) -> Vec<Command> {
        let ViewMode::RunResource(form) = &mut self.mode else {
            return Vec::new();
        };
        match action {
            Action::NextField => form.focus = form.focus.next(),
            Action::PrevField => form.focus = form.focus.prev(),
            Action::InputChar(c) => {
                form.focused_mut().push(c);
                form.error = None;
            }
            Action::Backspace => {
                form.focused_mut().pop();
                form.error = None;
            }
            Action::Submit => match form.validate() {
                Ok(spec) => {
                    self.mode = ViewMode::List;
                    return self.begin_action(Command::Create { spec });
                }
                Err(error) => {
                    debug!("run form rejected: {error}");
                    form.error = Some(error);
                }
            },
            Action::Back => self.mode = ViewMode::List,
            _ => {}
        }
        Vec::new()
    }

    fn pull_form_action(&mut self, action: Action) -> Vec<Command> {
        let ViewMode::Pull(form) = &mut self.mode else {
            return Vec::new();
        };
        match action {
            Action::InputChar(c) => {
                form.reference.push(c);
                form.error = None;
            }
            Action::Backspace => {
                form.reference.pop();
                form.error = None;
            }
            Action::Submit => match form.validate() {
                Ok(reference) => {
                    self.mode = ViewMode::List;
                    return self.begin_action(Command::Pull { reference });
                }
                Err(error) => form.error = Some(error),
            },
            Action::Back => self.mode = ViewMode::List,
            _ => {}
        }
        Vec::new()
    }

    /// Applies a loaded text buffer if the matching view is still open.
    pub(super) fn apply_text(
        &mut self,
        kind: ModeKind,
        target_id: &str,
        result: Result<String, String>,
    ) {
        let height = self.detail_height;
        let view = match (&mut self.mode, kind) {
            (ViewMode::Logs(view), ModeKind::Logs) | (ViewMode::Inspect(view), ModeKind::Inspect)
                if view.target.id == target_id =>
            {
                view
            }
            _ => {
                debug!("dropping stale {kind:?} result for {target_id}");
                return;
            }
        };

        match result {
            Ok(text) => {
                let mut lines = text.lines().map(str::to_string).collect::<Vec<_>>();
                if lines.is_empty() {
                    lines.push("(no output)".to_string());
                }
                view.body = TextBody::Lines(lines);
                if kind == ModeKind::Logs {
                    view.scroll_to_end(height);
                } else {
                    view.clamp(height);
                }
            }
            Err(error) => {
                let name = view.target.name.clone();
                view.body = TextBody::Failed(error.clone());
                view.scroll = 0;
                let what = if kind == ModeKind::Logs {
                    "load logs for"
                } else {
                    "inspect"
                };
                self.set_status(format!("Error: failed to {what} {name}: {error}"));
            }
        }
    }
}
