mod modes;

pub use modes::{
    Choice, DeleteConfirm, FilterPicker, FormField, ModeKind, PortSelector, PullForm, RunForm,
    TextBody, TextView, ViewMode,
};

use crate::error::ClientError;
use crate::input::{self, Action};
use crate::message::{Command, Message, PendingAction};
use crate::model::{
    Collection, ContainerRecord, ImageRecord, ListFilter, NetworkRecord, ResourceKind, Target,
    VolumeRecord,
};
use crate::presentation::{nth_visible, sort_by_tier, visible_len};
use crate::viewport::Viewport;
use chrono::{DateTime, Local};
use crossterm::event::KeyEvent;
use std::time::Duration;
use tracing::{debug, info, warn};

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const LIST_CHROME_ROWS: u16 = 8;
const DETAIL_CHROME_ROWS: u16 = 6;
const MIN_VIEW_ROWS: u16 = 3;

pub struct App {
    running: bool,
    fatal: Option<String>,
    engine_version: Option<String>,
    containers: Vec<ContainerRecord>,
    images: Vec<ImageRecord>,
    volumes: Vec<VolumeRecord>,
    networks: Vec<NetworkRecord>,
    last_refresh: [Option<DateTime<Local>>; 4],
    active_tab: ResourceKind,
    filters: [ListFilter; 4],
    mode: ViewMode,
    viewport: Viewport,
    detail_height: usize,
    action: Option<PendingAction>,
    status: String,
    loading: bool,
    show_help: bool,
    spinner_frame: usize,
    refresh_interval: Duration,
    log_tail: usize,
}

impl App {
    pub fn new(refresh_interval: Duration, log_tail: usize) -> Self {
        Self {
            running: true,
            fatal: None,
            engine_version: None,
            containers: Vec::new(),
            images: Vec::new(),
            volumes: Vec::new(),
            networks: Vec::new(),
            last_refresh: [None; 4],
            active_tab: ResourceKind::Containers,
            filters: [ListFilter::All; 4],
            mode: ViewMode::List,
            viewport: Viewport::new(10),
            detail_height: 20,
            action: None,
            status: "Ready".to_string(),
            loading: true,
            show_help: false,
            spinner_frame: 0,
            refresh_interval,
            log_tail,
        }
    }

    /// First commands after startup: every collection plus the refresh timer.
    pub fn init(&mut self) -> Vec<Command> {
        self.set_status("Loading...");
        let mut commands = ResourceKind::ALL.map(Command::Fetch).to_vec();
        commands.push(Command::ScheduleTick(self.refresh_interval));
        commands
    }

    /// Switches to the fatal screen; only quitting is accepted afterwards.
    pub fn set_fatal(&mut self, error: impl Into<String>) {
        self.fatal = Some(error.into());
        self.loading = false;
    }

    pub fn set_engine_version(&mut self, version: impl Into<String>) {
        self.engine_version = Some(version.into());
    }

    pub fn update(&mut self, message: Message) -> Vec<Command> {
        if self.fatal.is_some() {
            if let Message::Key(key) = message
                && input::map_key(ModeKind::List, key) == Some(Action::Quit)
            {
                self.running = false;
            }
            return Vec::new();
        }

        match message {
            Message::Key(key) => self.handle_key(key),
            Message::Resize { height, .. } => {
                self.resize(height);
                Vec::new()
            }
            Message::Tick => self.on_tick(),
            Message::AnimationTick => {
                if self.loading || self.action.is_some() {
                    self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
                }
                Vec::new()
            }
            Message::Fetched { kind, result } => {
                self.on_fetched(kind, result);
                Vec::new()
            }
            Message::ActionDone { action, result } => self.on_action_done(action, result),
            Message::LogsLoaded { target_id, result } => {
                self.apply_text(
                    ModeKind::Logs,
                    &target_id,
                    result.map_err(|error| error.to_string()),
                );
                Vec::new()
            }
            Message::Inspected { target_id, result } => {
                self.apply_text(
                    ModeKind::Inspect,
                    &target_id,
                    result.map_err(|error| error.to_string()),
                );
                Vec::new()
            }
            Message::UrlOpened { url, result } => {
                match result {
                    Ok(()) => self.set_status(format!("Opened {url}")),
                    Err(error) => self.set_status(format!("Error: failed to open {url}: {error}")),
                }
                Vec::new()
            }
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let action = input::map_key(self.mode.kind(), key);
        if self.show_help && action != Some(Action::Quit) {
            self.show_help = false;
            return Vec::new();
        }
        match action {
            Some(action) => self.apply_action(action),
            None => Vec::new(),
        }
    }

    pub fn apply_action(&mut self, action: Action) -> Vec<Command> {
        match action {
            Action::Quit => {
                self.running = false;
                Vec::new()
            }
            Action::ToggleHelp => {
                self.show_help = !self.show_help;
                Vec::new()
            }
            action if self.action.is_some() && !action.is_navigation() => {
                debug!("swallowing {action:?} while an action is in progress");
                Vec::new()
            }
            action => self.route_action(action),
        }
    }

    /// Marks a mutating command in flight. Refuses a second one.
    fn begin_action(&mut self, command: Command) -> Vec<Command> {
        if !command.is_mutating() {
            return vec![command];
        }
        if let Some(current) = &self.action {
            debug!("refusing {command:?} while {current:?} runs");
            return Vec::new();
        }
        let Some(action) = command.pending_action() else {
            return vec![command];
        };
        info!("{}", action.in_progress_text());
        self.set_status(action.in_progress_text());
        self.action = Some(action);
        vec![command]
    }

    fn on_action_done(
        &mut self,
        action: PendingAction,
        result: Result<String, ClientError>,
    ) -> Vec<Command> {
        self.action = None;
        match result {
            Ok(_) => {
                info!("{}", action.done_text());
                self.set_status(action.done_text());
                let mut commands = vec![Command::Fetch(ResourceKind::Containers)];
                if action.kind != ResourceKind::Containers {
                    commands.push(Command::Fetch(action.kind));
                }
                commands
            }
            Err(error) => {
                warn!("{}", action.failed_text(&error));
                self.set_status(format!("Error: {}", action.failed_text(&error)));
                Vec::new()
            }
        }
    }

    fn on_tick(&mut self) -> Vec<Command> {
        let mut commands = Vec::new();
        if self.action.is_none() {
            commands.extend(ResourceKind::ALL.map(Command::Fetch));
        }
        commands.push(Command::ScheduleTick(self.refresh_interval));
        commands
    }

    fn on_fetched(&mut self, kind: ResourceKind, result: Result<Collection, ClientError>) {
        self.loading = false;
        let collection = match result {
            Ok(collection) => collection,
            Err(error) => {
                warn!("refresh of {} failed: {error}", kind.title());
                self.set_status(format!(
                    "Error: failed to refresh {}: {error}",
                    kind.title().to_lowercase()
                ));
                return;
            }
        };
        if collection.kind() != kind {
            warn!("ignoring {} delivered as {}", collection.kind(), kind);
            return;
        }

        match collection {
            Collection::Containers(mut rows) => {
                sort_by_tier(&mut rows);
                self.containers = rows;
            }
            Collection::Images(mut rows) => {
                sort_by_tier(&mut rows);
                self.images = rows;
            }
            Collection::Volumes(mut rows) => {
                sort_by_tier(&mut rows);
                self.volumes = rows;
            }
            Collection::Networks(mut rows) => {
                sort_by_tier(&mut rows);
                self.networks = rows;
            }
        }
        self.last_refresh[kind.index()] = Some(Local::now());
        if kind == self.active_tab {
            self.clamp_list();
        }
    }

    fn resize(&mut self, height: u16) {
        let list_rows = height.saturating_sub(LIST_CHROME_ROWS).max(MIN_VIEW_ROWS);
        let detail_rows = height.saturating_sub(DETAIL_CHROME_ROWS).max(MIN_VIEW_ROWS);
        let len = self.visible_len();
        self.viewport.set_height(usize::from(list_rows), len);
        self.detail_height = usize::from(detail_rows);
        if let ViewMode::Logs(view) | ViewMode::Inspect(view) = &mut self.mode {
            view.clamp(self.detail_height);
        }
    }

    fn clamp_list(&mut self) {
        let len = self.visible_len();
        self.viewport.clamp(len);
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = normalize_status_text(status.into());
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn fatal(&self) -> Option<&str> {
        self.fatal.as_deref()
    }

    pub fn engine_version(&self) -> Option<&str> {
        self.engine_version.as_deref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn mode(&self) -> &ViewMode {
        &self.mode
    }

    pub fn active_tab(&self) -> ResourceKind {
        self.active_tab
    }

    pub fn filter(&self, kind: ResourceKind) -> ListFilter {
        self.filters[kind.index()]
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn detail_height(&self) -> usize {
        self.detail_height
    }

    pub fn action_in_progress(&self) -> Option<&PendingAction> {
        self.action.as_ref()
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn show_help(&self) -> bool {
        self.show_help
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER_FRAMES[self.spinner_frame % SPINNER_FRAMES.len()]
    }

    pub fn last_refresh(&self, kind: ResourceKind) -> Option<String> {
        self.last_refresh[kind.index()].map(|ts| ts.format("%H:%M:%S").to_string())
    }

    pub fn containers(&self) -> &[ContainerRecord] {
        &self.containers
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.images
    }

    pub fn volumes(&self) -> &[VolumeRecord] {
        &self.volumes
    }

    pub fn networks(&self) -> &[NetworkRecord] {
        &self.networks
    }

    pub fn visible_len(&self) -> usize {
        let filter = self.filter(self.active_tab);
        match self.active_tab {
            ResourceKind::Containers => visible_len(&self.containers, filter),
            ResourceKind::Images => visible_len(&self.images, filter),
            ResourceKind::Volumes => visible_len(&self.volumes, filter),
            ResourceKind::Networks => visible_len(&self.networks, filter),
        }
    }

    pub fn selected_target(&self) -> Option<Target> {
        let kind = self.active_tab;
        let filter = self.filter(kind);
        let index = self.viewport.selection;
        match kind {
            ResourceKind::Containers => {
                nth_visible(&self.containers, filter, index).map(|row| Target::of(kind, row))
            }
            ResourceKind::Images => {
                nth_visible(&self.images, filter, index).map(|row| Target::of(kind, row))
            }
            ResourceKind::Volumes => {
                nth_visible(&self.volumes, filter, index).map(|row| Target::of(kind, row))
            }
            ResourceKind::Networks => {
                nth_visible(&self.networks, filter, index).map(|row| Target::of(kind, row))
            }
        }
    }

    fn selected_container(&self) -> Option<&ContainerRecord> {
        if self.active_tab != ResourceKind::Containers {
            return None;
        }
        nth_visible(
            &self.containers,
            self.filter(ResourceKind::Containers),
            self.viewport.selection,
        )
    }

    fn selected_image(&self) -> Option<&ImageRecord> {
        if self.active_tab != ResourceKind::Images {
            return None;
        }
        nth_visible(
            &self.images,
            self.filter(ResourceKind::Images),
            self.viewport.selection,
        )
    }
}

fn normalize_status_text(status: String) -> String {
    const MAX_STATUS_LEN: usize = 180;
    if status.chars().count() <= MAX_STATUS_LEN {
        return status;
    }

    let mut shortened = status
        .chars()
        .take(MAX_STATUS_LEN.saturating_sub(1))
        .collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::{App, Choice, ModeKind, TextBody, ViewMode, normalize_status_text};
    use crate::error::ClientError;
    use crate::message::{ActionOp, Command, Message, PendingAction};
    use crate::model::{
        Collection, ContainerRecord, ContainerState, ImageRecord, MutateOp, PortBinding,
        ResourceKind, VolumeRecord,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use std::time::Duration;

    const REFRESH: Duration = Duration::from_secs(2);

    fn container(index: usize, state: ContainerState) -> ContainerRecord {
        ContainerRecord {
            id: format!("c{index}"),
            name: format!("app-{index}"),
            image: "nginx:latest".to_string(),
            state,
            status: String::new(),
            ports: Vec::new(),
            created: String::new(),
            cpu_percent: None,
            memory_percent: None,
            memory_usage: None,
        }
    }

    fn image(index: usize, in_use: bool) -> ImageRecord {
        ImageRecord {
            id: format!("sha256:{index:064}"),
            repository: format!("repo{index}"),
            tag: "latest".to_string(),
            size: "5MB".to_string(),
            created: "1 day ago".to_string(),
            in_use,
        }
    }

    fn running(count: usize) -> Vec<ContainerRecord> {
        (0..count)
            .map(|index| container(index, ContainerState::Running))
            .collect()
    }

    fn app_with(containers: Vec<ContainerRecord>, height: u16) -> App {
        let mut app = App::new(REFRESH, 100);
        app.update(Message::Resize { width: 120, height });
        app.update(Message::Fetched {
            kind: ResourceKind::Containers,
            result: Ok(Collection::Containers(containers)),
        });
        app
    }

    fn press(app: &mut App, code: KeyCode) -> Vec<Command> {
        app.update(Message::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn char_key(app: &mut App, c: char) -> Vec<Command> {
        press(app, KeyCode::Char(c))
    }

    fn assert_invariants(app: &App) {
        let len = app.visible_len();
        let viewport = app.viewport();
        assert!(viewport.selection < len.max(1), "selection out of range");
        assert!(
            viewport.scroll <= len.saturating_sub(viewport.height),
            "scroll past last page"
        );
        if len > 0 {
            assert!(viewport.selection >= viewport.scroll);
            assert!(viewport.selection < viewport.scroll + viewport.height);
        }
    }

    fn stop_action(name: &str) -> PendingAction {
        PendingAction {
            op: ActionOp::Stop,
            kind: ResourceKind::Containers,
            name: name.to_string(),
        }
    }

    #[test]
    fn init_fetches_every_kind_and_schedules_refresh() {
        let mut app = App::new(REFRESH, 100);
        let commands = app.init();
        assert_eq!(
            commands,
            vec![
                Command::Fetch(ResourceKind::Containers),
                Command::Fetch(ResourceKind::Images),
                Command::Fetch(ResourceKind::Volumes),
                Command::Fetch(ResourceKind::Networks),
                Command::ScheduleTick(REFRESH),
            ]
        );
        assert!(app.loading());
    }

    #[test]
    fn resize_derives_list_and_detail_heights() {
        let mut app = App::new(REFRESH, 100);
        app.update(Message::Resize {
            width: 80,
            height: 40,
        });
        assert_eq!(app.viewport().height, 32);
        assert_eq!(app.detail_height(), 34);

        app.update(Message::Resize {
            width: 80,
            height: 5,
        });
        assert_eq!(app.viewport().height, 3);
        assert_eq!(app.detail_height(), 3);
    }

    #[test]
    fn moving_past_last_visible_row_scrolls_one() {
        let mut app = app_with(running(25), 18);
        assert_eq!(app.viewport().height, 10);
        for _ in 0..9 {
            char_key(&mut app, 'j');
        }
        assert_eq!((app.viewport().selection, app.viewport().scroll), (9, 0));

        press(&mut app, KeyCode::Down);
        assert_eq!(app.viewport().selection, 10);
        assert_eq!(app.viewport().scroll, 1);
        assert_eq!(app.viewport().range(app.visible_len()), 1..11);
    }

    #[test]
    fn stop_reports_progress_then_refreshes_containers() {
        let mut app = app_with(vec![container(0, ContainerState::Running)], 30);

        let commands = char_key(&mut app, 'x');
        assert_eq!(commands.len(), 1);
        assert!(matches!(
            &commands[0],
            Command::Mutate { target, op: MutateOp::Stop } if target.id == "c0"
        ));
        assert_eq!(app.status(), "Stopping app-0...");
        assert!(app.action_in_progress().is_some());

        let commands = app.update(Message::ActionDone {
            action: stop_action("app-0"),
            result: Ok("c0".to_string()),
        });
        assert_eq!(app.status(), "Stopped app-0");
        assert!(app.action_in_progress().is_none());
        assert_eq!(commands, vec![Command::Fetch(ResourceKind::Containers)]);
    }

    #[test]
    fn second_mutation_is_refused_while_one_is_in_flight() {
        let mut app = app_with(
            vec![
                container(0, ContainerState::Running),
                container(1, ContainerState::Exited),
            ],
            30,
        );
        assert_eq!(char_key(&mut app, 'x').len(), 1);

        assert!(char_key(&mut app, 'R').is_empty());
        assert!(char_key(&mut app, 'd').is_empty());
        assert_eq!(app.mode().kind(), ModeKind::List);
        char_key(&mut app, 'j');
        assert_eq!(app.viewport().selection, 1);
        assert!(char_key(&mut app, 's').is_empty());
        assert_eq!(app.status(), "Stopping app-0...");
    }

    #[test]
    fn ticks_skip_fetches_while_busy_but_keep_the_timer() {
        let mut app = app_with(vec![container(0, ContainerState::Running)], 30);
        assert_eq!(app.update(Message::Tick).len(), 5);

        char_key(&mut app, 'x');
        assert_eq!(
            app.update(Message::Tick),
            vec![Command::ScheduleTick(REFRESH)]
        );
    }

    #[test]
    fn fetch_results_do_not_release_the_action_guard() {
        let mut app = app_with(vec![container(0, ContainerState::Running)], 30);
        char_key(&mut app, 'x');
        app.update(Message::Fetched {
            kind: ResourceKind::Containers,
            result: Ok(Collection::Containers(vec![container(
                0,
                ContainerState::Exited,
            )])),
        });
        assert!(app.action_in_progress().is_some());
    }

    #[test]
    fn unused_filter_resets_selection_and_hides_in_use() {
        let mut app = App::new(REFRESH, 100);
        app.update(Message::Resize {
            width: 100,
            height: 12,
        });
        let images = (0..10).map(|index| image(index, index < 3)).collect();
        app.update(Message::Fetched {
            kind: ResourceKind::Images,
            result: Ok(Collection::Images(images)),
        });
        char_key(&mut app, '2');
        press(&mut app, KeyCode::End);
        assert_eq!(app.viewport().selection, 9);

        char_key(&mut app, 'f');
        assert_eq!(app.mode().kind(), ModeKind::Filter);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.mode().kind(), ModeKind::List);
        assert_eq!(app.visible_len(), 7);
        assert_eq!(app.images().len(), 10);
        assert_eq!((app.viewport().selection, app.viewport().scroll), (0, 0));
        assert_eq!(app.status(), "Images filter: Unused");
    }

    #[test]
    fn timed_out_action_clears_guard_and_keeps_collections() {
        let mut app = app_with(vec![container(0, ContainerState::Running)], 30);
        char_key(&mut app, 'x');
        let before = app.containers().to_vec();

        let commands = app.update(Message::ActionDone {
            action: stop_action("app-0"),
            result: Err(ClientError::TimedOut(Duration::from_secs(30))),
        });
        assert!(commands.is_empty());
        assert_eq!(
            app.status(),
            "Error: failed to stop app-0: timed out after 30s"
        );
        assert!(app.action_in_progress().is_none());
        assert_eq!(app.containers(), before.as_slice());

        assert_eq!(char_key(&mut app, 'x').len(), 1);
    }

    #[test]
    fn failed_refresh_keeps_previous_rows() {
        let mut app = app_with(running(3), 30);
        app.update(Message::Fetched {
            kind: ResourceKind::Containers,
            result: Err(ClientError::Transport("connection refused".to_string())),
        });
        assert_eq!(app.containers().len(), 3);
        assert_eq!(
            app.status(),
            "Error: failed to refresh containers: transport error: connection refused"
        );
    }

    #[test]
    fn fetched_rows_are_ordered_by_tier() {
        let app = app_with(
            vec![
                container(0, ContainerState::Exited),
                container(1, ContainerState::Dead),
                container(2, ContainerState::Running),
                container(3, ContainerState::Created),
            ],
            30,
        );
        let ids = app
            .containers()
            .iter()
            .map(|row| row.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["c2", "c0", "c3", "c1"]);
        assert!(app.last_refresh(ResourceKind::Containers).is_some());
        assert!(app.last_refresh(ResourceKind::Images).is_none());
    }

    #[test]
    fn logs_for_a_closed_or_different_view_are_dropped() {
        let mut app = app_with(running(2), 30);
        let commands = char_key(&mut app, 'L');
        assert_eq!(commands.len(), 1);
        assert!(matches!(&commands[0], Command::FetchLogs { target, tail: 100 } if target.id == "c0"));

        app.update(Message::LogsLoaded {
            target_id: "c1".to_string(),
            result: Ok("other".to_string()),
        });
        match app.mode() {
            ViewMode::Logs(view) => assert_eq!(view.body, TextBody::Loading),
            other => panic!("unexpected mode: {other:?}"),
        }

        press(&mut app, KeyCode::Esc);
        app.update(Message::LogsLoaded {
            target_id: "c0".to_string(),
            result: Ok("late".to_string()),
        });
        assert_eq!(app.mode(), &ViewMode::List);
    }

    #[test]
    fn logs_open_scrolled_to_the_tail() {
        let mut app = app_with(running(1), 16);
        char_key(&mut app, 'L');
        let text = (0..50)
            .map(|index| format!("line {index}"))
            .collect::<Vec<_>>()
            .join("\n");
        app.update(Message::LogsLoaded {
            target_id: "c0".to_string(),
            result: Ok(text),
        });
        match app.mode() {
            ViewMode::Logs(view) => assert_eq!(view.scroll, 40),
            other => panic!("unexpected mode: {other:?}"),
        }
        char_key(&mut app, 'g');
        match app.mode() {
            ViewMode::Logs(view) => assert_eq!(view.scroll, 0),
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn inspect_failure_degrades_to_message() {
        let mut app = app_with(running(1), 30);
        assert_eq!(char_key(&mut app, 'i').len(), 1);
        app.update(Message::Inspected {
            target_id: "c0".to_string(),
            result: Err(ClientError::Malformed("expected value".to_string())),
        });
        match app.mode() {
            ViewMode::Inspect(view) => assert!(matches!(view.body, TextBody::Failed(_))),
            other => panic!("unexpected mode: {other:?}"),
        }
        assert!(app.status().starts_with("Error: failed to inspect app-0"));
    }

    #[test]
    fn delete_defaults_to_no_and_requires_yes() {
        let mut app = app_with(running(1), 30);
        char_key(&mut app, 'd');
        match app.mode() {
            ViewMode::DeleteConfirm(confirm) => assert_eq!(confirm.choice, Choice::No),
            other => panic!("unexpected mode: {other:?}"),
        }
        assert!(press(&mut app, KeyCode::Enter).is_empty());
        assert_eq!(app.mode(), &ViewMode::List);
        assert_eq!(app.status(), "Delete cancelled");

        char_key(&mut app, 'd');
        char_key(&mut app, 'l');
        let commands = press(&mut app, KeyCode::Enter);
        assert!(matches!(
            &commands[..],
            [Command::Mutate { op: MutateOp::Delete, target }] if target.id == "c0"
        ));
        assert_eq!(app.status(), "Deleting app-0...");
    }

    #[test]
    fn deleting_a_volume_refreshes_containers_and_volumes() {
        let mut app = App::new(REFRESH, 100);
        app.update(Message::Fetched {
            kind: ResourceKind::Volumes,
            result: Ok(Collection::Volumes(vec![VolumeRecord {
                name: "data".to_string(),
                driver: "local".to_string(),
                mountpoint: "/data".to_string(),
                in_use: false,
            }])),
        });
        char_key(&mut app, '3');
        char_key(&mut app, 'd');
        char_key(&mut app, 'y');
        let commands = press(&mut app, KeyCode::Enter);
        let Some(Command::Mutate { target, .. }) = commands.first() else {
            panic!("expected a delete command");
        };
        assert_eq!(target.kind, ResourceKind::Volumes);

        let commands = app.update(Message::ActionDone {
            action: PendingAction {
                op: ActionOp::Delete,
                kind: ResourceKind::Volumes,
                name: "data".to_string(),
            },
            result: Ok("data".to_string()),
        });
        assert_eq!(
            commands,
            vec![
                Command::Fetch(ResourceKind::Containers),
                Command::Fetch(ResourceKind::Volumes)
            ]
        );
    }

    #[test]
    fn lifecycle_keys_check_tab_and_state() {
        let mut app = app_with(
            vec![
                container(0, ContainerState::Running),
                container(1, ContainerState::Exited),
            ],
            30,
        );
        assert!(char_key(&mut app, 's').is_empty());
        assert_eq!(app.status(), "app-0 is already running");

        char_key(&mut app, 'j');
        assert!(char_key(&mut app, 'x').is_empty());
        assert_eq!(app.status(), "app-1 is not running");
        assert!(char_key(&mut app, 'c').is_empty());
        assert!(char_key(&mut app, 'o').is_empty());

        char_key(&mut app, '2');
        assert!(char_key(&mut app, 's').is_empty());
        assert_eq!(app.status(), "Start is only available for containers");
        assert!(char_key(&mut app, 'L').is_empty());
        assert_eq!(app.active_tab(), ResourceKind::Images);
    }

    #[test]
    fn port_selector_opens_localhost_url() {
        let mut web = container(0, ContainerState::Running);
        web.ports = vec![
            PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(8443),
                container_port: 443,
                protocol: "tcp".to_string(),
            },
            PortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(8080),
                container_port: 80,
                protocol: "tcp".to_string(),
            },
        ];
        let mut app = app_with(vec![web], 30);
        char_key(&mut app, 'o');
        assert_eq!(app.mode().kind(), ModeKind::PortSelector);
        press(&mut app, KeyCode::Down);
        let commands = press(&mut app, KeyCode::Enter);
        assert_eq!(
            commands,
            vec![Command::OpenUrl {
                url: "http://localhost:8443".to_string()
            }]
        );
        assert_eq!(app.mode(), &ViewMode::List);
    }

    #[test]
    fn run_form_submits_only_when_valid() {
        let mut app = App::new(REFRESH, 100);
        app.update(Message::Fetched {
            kind: ResourceKind::Images,
            result: Ok(Collection::Images(vec![image(1, false)])),
        });
        char_key(&mut app, '2');
        char_key(&mut app, 'n');
        assert_eq!(app.mode().kind(), ModeKind::RunResource);

        for c in "web".chars() {
            char_key(&mut app, c);
        }
        press(&mut app, KeyCode::Tab);
        for c in "80:http".chars() {
            char_key(&mut app, c);
        }
        assert!(press(&mut app, KeyCode::Enter).is_empty());
        match app.mode() {
            ViewMode::RunResource(form) => assert!(form.error.is_some()),
            other => panic!("unexpected mode: {other:?}"),
        }

        for _ in 0..4 {
            press(&mut app, KeyCode::Backspace);
        }
        for c in "80".chars() {
            char_key(&mut app, c);
        }
        let commands = press(&mut app, KeyCode::Enter);
        match &commands[..] {
            [Command::Create { spec }] => {
                assert_eq!(spec.image, "repo1:latest");
                assert_eq!(spec.name.as_deref(), Some("web"));
                assert_eq!(spec.ports, vec!["80:80".to_string()]);
            }
            other => panic!("unexpected commands: {other:?}"),
        }
        assert_eq!(app.mode(), &ViewMode::List);
        assert!(app.action_in_progress().is_some());
    }

    #[test]
    fn pull_form_keeps_q_as_text() {
        let mut app = App::new(REFRESH, 100);
        char_key(&mut app, '2');
        char_key(&mut app, 'p');
        for c in "quay.io/app".chars() {
            char_key(&mut app, c);
        }
        assert!(app.running());
        let commands = press(&mut app, KeyCode::Enter);
        assert_eq!(
            commands,
            vec![Command::Pull {
                reference: "quay.io/app".to_string()
            }]
        );
        assert_eq!(app.status(), "Pulling quay.io/app...");
    }

    #[test]
    fn escape_discards_mode_scratch() {
        let mut app = App::new(REFRESH, 100);
        char_key(&mut app, '2');
        char_key(&mut app, 'p');
        char_key(&mut app, 'a');
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.mode(), &ViewMode::List);
        char_key(&mut app, 'p');
        match app.mode() {
            ViewMode::Pull(form) => assert!(form.reference.is_empty()),
            other => panic!("unexpected mode: {other:?}"),
        }
    }

    #[test]
    fn help_overlay_swallows_the_next_key() {
        let mut app = app_with(running(3), 30);
        char_key(&mut app, '?');
        assert!(app.show_help());
        char_key(&mut app, 'j');
        assert!(!app.show_help());
        assert_eq!(app.viewport().selection, 0);
    }

    #[test]
    fn fatal_screen_accepts_only_quit() {
        let mut app = App::new(REFRESH, 100);
        app.set_fatal("Cannot connect to the Docker daemon");
        assert!(app.update(Message::Tick).is_empty());
        assert!(char_key(&mut app, 'r').is_empty());
        assert!(app.running());
        char_key(&mut app, 'q');
        assert!(!app.running());
    }

    #[test]
    fn animation_advances_only_while_busy() {
        let mut app = App::new(REFRESH, 100);
        let first = app.spinner();
        app.update(Message::AnimationTick);
        assert_ne!(app.spinner(), first);

        let mut idle = app_with(running(1), 30);
        let frame = idle.spinner();
        idle.update(Message::AnimationTick);
        assert_eq!(idle.spinner(), frame);
    }

    #[test]
    fn invariants_hold_across_refreshes_resizes_and_keys() {
        let mut app = app_with(running(40), 20);
        let steps: Vec<Message> = vec![
            Message::Key(KeyEvent::new(KeyCode::End, KeyModifiers::NONE)),
            Message::Fetched {
                kind: ResourceKind::Containers,
                result: Ok(Collection::Containers(running(12))),
            },
            Message::Resize {
                width: 80,
                height: 9,
            },
            Message::Key(KeyEvent::new(KeyCode::PageUp, KeyModifiers::NONE)),
            Message::Fetched {
                kind: ResourceKind::Containers,
                result: Ok(Collection::Containers(Vec::new())),
            },
            Message::Key(KeyEvent::new(KeyCode::Down, KeyModifiers::NONE)),
            Message::Fetched {
                kind: ResourceKind::Containers,
                result: Ok(Collection::Containers(running(60))),
            },
            Message::Key(KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE)),
            Message::Resize {
                width: 80,
                height: 50,
            },
            Message::Key(KeyEvent::new(KeyCode::Char('G'), KeyModifiers::NONE)),
            Message::Resize {
                width: 80,
                height: 12,
            },
            Message::Key(KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE)),
            Message::Key(KeyEvent::new(KeyCode::BackTab, KeyModifiers::NONE)),
            Message::Fetched {
                kind: ResourceKind::Containers,
                result: Ok(Collection::Containers(running(7))),
            },
        ];
        for message in steps {
            app.update(message);
            assert_invariants(&app);
        }
    }

    #[test]
    fn long_status_is_truncated() {
        let status = normalize_status_text("x".repeat(400));
        assert_eq!(status.chars().count(), 180);
        assert!(status.ends_with('…'));
    }
}
