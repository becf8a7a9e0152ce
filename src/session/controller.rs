use super::desktop::{negotiate, DesktopNegotiation};
use super::directory::SessionDirectory;
use super::params::build_connect_request;
use super::remote::{DisconnectReason, RemoteSession};
use super::surface::{caption_for, SessionSurface, WindowState};
use crate::registry::{EventQueue, RegistryObserver, SettingsRegistry, SubscriptionId};

use rdpdeck_core::{
    ClientIcon, ConnectionError, ConnectionIntent, ConnectionStatus, RegistryEvent, Result,
    Size, TreeError, TreeId,
};
use std::collections::VecDeque;
use std::rc::Rc;

/// Application options that affect every session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub close_window_after_disconnect: bool,
    pub use_multiple_monitors: bool,
}

/// Buffers registry events for one session window.
///
/// A `Connect` for this session is judged against the status at the moment it
/// is published: one arriving while the session is connecting or connected is
/// dropped here instead of being replayed on a later pump.
struct SessionInbox {
    tree_id: TreeId,
    directory: SessionDirectory,
    events: EventQueue,
}

impl RegistryObserver for SessionInbox {
    fn notify(&self, event: &RegistryEvent) {
        if let RegistryEvent::ConnectionStateChanged(change) = event {
            if change.tree_id == self.tree_id && change.intent == ConnectionIntent::Connect {
                match self.directory.status(self.tree_id) {
                    Some(ConnectionStatus::Disconnected) | None => {}
                    Some(status) => {
                        log::debug!(
                            "Connect request for {} dropped: session is {}",
                            self.tree_id,
                            status.display_name()
                        );
                        return;
                    }
                }
            }
        }
        self.events.notify(event);
    }
}

/// Connection state machine for one open session window.
///
/// Driven from the window's own loop: the host forwards remote notifications
/// (`on_connected`, `on_disconnected`, ...) and surface events, and calls
/// `pump_events` to apply registry notifications queued since the last turn.
pub struct SessionController<R: RemoteSession, S: SessionSurface> {
    tree_id: TreeId,
    registry: Rc<SettingsRegistry>,
    directory: SessionDirectory,
    remote: R,
    surface: S,
    options: SessionOptions,
    events: EventQueue,
    subscription: Option<SubscriptionId>,
    status: ConnectionStatus,
    /// Facts this controller published that will come back through `events`
    echoes: VecDeque<ConnectionIntent>,
    negotiation: Option<DesktopNegotiation>,
    window_state: WindowState,
    name: String,
    target: String,
    icon: ClientIcon,
    last_error: Option<ConnectionError>,
}

impl<R: RemoteSession, S: SessionSurface> SessionController<R, S> {
    /// Open a session for client `tree_id`. Fails if the node is missing,
    /// is a folder, or already has an open session.
    pub fn new(
        tree_id: TreeId,
        registry: Rc<SettingsRegistry>,
        directory: SessionDirectory,
        remote: R,
        mut surface: S,
        options: SessionOptions,
    ) -> Result<Self> {
        let node = registry.get_node(tree_id).ok_or(TreeError::NotFound(tree_id))?;
        let settings = registry.get_session_settings(tree_id).ok_or_else(|| {
            TreeError::invalid(format!("node {} is a folder and cannot be opened", tree_id))
        })?;
        if !directory.register(tree_id) {
            return Err(TreeError::invalid(format!(
                "a session for node {} is already open",
                tree_id
            )));
        }

        let events = EventQueue::new();
        let subscription = registry.subscribe(Rc::new(SessionInbox {
            tree_id,
            directory: directory.clone(),
            events: events.clone(),
        }));
        surface.set_caption(&caption_for(&node.name));
        surface.set_connected(false, settings.icon);

        Ok(Self {
            tree_id,
            registry,
            directory,
            remote,
            surface,
            options,
            events,
            subscription: Some(subscription),
            status: ConnectionStatus::Disconnected,
            echoes: VecDeque::new(),
            negotiation: None,
            window_state: WindowState::Normal,
            target: settings.target(&node.name).to_string(),
            name: node.name,
            icon: settings.icon,
            last_error: None,
        })
    }

    pub fn tree_id(&self) -> TreeId {
        self.tree_id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Failure reported by the most recent connection attempt, if any.
    pub fn last_error(&self) -> Option<&ConnectionError> {
        self.last_error.as_ref()
    }

    pub fn negotiation(&self) -> Option<DesktopNegotiation> {
        self.negotiation
    }

    pub fn window_state(&self) -> WindowState {
        self.window_state
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        self.status = status;
        self.directory.set_status(self.tree_id, status);
    }

    /// Announce a transition this controller made.
    fn publish_fact(&mut self, intent: ConnectionIntent) {
        // A Connect fact is published while Connected, so the inbox drops it
        if self.subscription.is_some() && intent != ConnectionIntent::Connect {
            self.echoes.push_back(intent);
        }
        self.registry.request_state(self.tree_id, intent);
    }

    fn enter_connected(&mut self) {
        self.set_status(ConnectionStatus::Connected);
        self.surface.set_connected(true, self.icon);
        self.publish_fact(ConnectionIntent::Connect);
    }

    fn enter_disconnected(&mut self) {
        self.set_status(ConnectionStatus::Disconnected);
        self.surface.set_connected(false, self.icon);
        self.publish_fact(ConnectionIntent::Disconnect);
    }

    // === Commands ===

    /// Start connecting. A no-op unless the session is `Disconnected`.
    pub fn connect(&mut self) -> Result<()> {
        if self.status != ConnectionStatus::Disconnected {
            log::info!(
                "Connect request for {} ignored: session to {} is already {}",
                self.tree_id,
                self.target,
                self.status.display_name()
            );
            return Ok(());
        }

        let node = self
            .registry
            .get_node(self.tree_id)
            .ok_or(TreeError::NotFound(self.tree_id))?;
        let settings = self
            .registry
            .get_session_settings(self.tree_id)
            .ok_or_else(|| TreeError::invalid(format!("node {} has no session settings", self.tree_id)))?;

        let negotiation = negotiate(
            &settings.desktop_size,
            self.surface.client_size(),
            &self.surface.display_topology(),
            self.remote.max_desktop_size(),
            self.options.use_multiple_monitors,
        );
        let request = build_connect_request(&node, &settings, negotiation);

        self.name = node.name;
        self.target = request.target.clone();
        self.icon = settings.icon;
        self.negotiation = Some(negotiation);
        self.last_error = None;
        self.set_status(ConnectionStatus::Connecting);

        log::info!(
            "Connecting {} to {}:{} ({:?})",
            self.tree_id,
            request.target,
            request.options.port,
            negotiation
        );
        self.remote.connect(&request);
        Ok(())
    }

    /// End a connected session. Ignored in any other state.
    pub fn disconnect(&mut self) {
        match self.status {
            ConnectionStatus::Connected => {
                self.close_remote();
                self.enter_disconnected();
            }
            ConnectionStatus::Connecting => {
                log::debug!("Disconnect request for {} ignored while connecting", self.tree_id);
            }
            ConnectionStatus::Disconnected => {
                log::debug!("Disconnect request for {} ignored: not connected", self.tree_id);
            }
        }
    }

    fn close_remote(&mut self) {
        if self.remote.supports_request_close() {
            self.remote.request_close();
        } else {
            self.remote.disconnect();
        }
    }

    /// Bring the session window forward. Only applies while connected.
    pub fn focus(&mut self) {
        if self.status.is_connected() {
            self.surface.focus();
        } else {
            log::debug!(
                "Focus request for {} ignored: session is {}",
                self.tree_id,
                self.status.display_name()
            );
        }
    }

    pub fn handle_intent(&mut self, intent: ConnectionIntent) -> Result<()> {
        match intent {
            ConnectionIntent::Connect => self.connect()?,
            ConnectionIntent::Disconnect => self.disconnect(),
            ConnectionIntent::Focus => self.focus(),
        }
        Ok(())
    }

    /// Apply registry notifications received since the last call.
    pub fn pump_events(&mut self) {
        for event in self.events.drain() {
            if event.tree_id() != self.tree_id {
                continue;
            }
            match event {
                RegistryEvent::ConnectionStateChanged(change) => {
                    if self.echoes.front() == Some(&change.intent) {
                        self.echoes.pop_front();
                        continue;
                    }
                    if let Err(e) = self.handle_intent(change.intent) {
                        log::warn!("Failed to apply {:?} to session {}: {}", change.intent, self.tree_id, e);
                    }
                }
                RegistryEvent::NodeChanged(node) => {
                    if node.name != self.name {
                        self.surface.set_caption(&caption_for(&node.name));
                        self.name = node.name;
                    }
                    if let Some(settings) = self.registry.get_session_settings(self.tree_id) {
                        if settings.icon != self.icon {
                            self.icon = settings.icon;
                            self.surface.set_connected(self.status.is_connected(), self.icon);
                        }
                    }
                }
                RegistryEvent::NodeRemoved(_) => {
                    log::info!("Client {} was deleted, closing its session window", self.tree_id);
                    self.surface.request_close();
                }
            }
        }
    }

    // === Remote notifications ===

    pub fn on_connected(&mut self) {
        if self.status != ConnectionStatus::Connecting {
            log::debug!(
                "Ignoring connected notification for {} while {}",
                self.tree_id,
                self.status.display_name()
            );
            return;
        }
        log::info!("Connected to {} ({})", self.target, self.tree_id);
        self.enter_connected();
    }

    /// The remote session ended. Returns the failure when the reason counts
    /// as one; any reason while still connecting is a failure.
    pub fn on_disconnected(&mut self, reason: DisconnectReason) -> Option<ConnectionError> {
        let failed = match self.status {
            ConnectionStatus::Disconnected => {
                log::debug!("Ignoring disconnected notification for {}: already disconnected", self.tree_id);
                return None;
            }
            ConnectionStatus::Connecting => true,
            ConnectionStatus::Connected => reason.is_error(),
        };

        let description = self.remote.get_error_description(reason.code);
        let error = failed.then(|| ConnectionError {
            tree_id: self.tree_id,
            target: self.target.clone(),
            code: reason.code,
            description: description.clone(),
        });
        match &error {
            Some(e) => log::warn!("{}", e),
            None => log::debug!("Session to {} closed: {}", self.target, description),
        }

        self.enter_disconnected();
        self.last_error = error.clone();
        if self.options.close_window_after_disconnect {
            self.surface.request_close();
        }
        error
    }

    /// The remote left full screen on its own.
    pub fn on_request_leave_full_screen(&mut self) {
        log::debug!("Session {} left full screen", self.tree_id);
        self.window_state = WindowState::Normal;
    }

    // === Surface notifications ===

    pub fn on_surface_resized(&mut self, size: Size) {
        if !self.status.is_connected() || size.is_empty() {
            return;
        }
        if self.negotiation.is_some_and(|n| n.follows_surface()) {
            self.remote.set_desktop_size(size);
        }
    }

    pub fn on_window_state_changed(&mut self, state: WindowState) {
        if state == self.window_state {
            return;
        }
        self.window_state = state;
        if !self.status.is_connected() {
            return;
        }
        match state {
            WindowState::Maximized => self.remote.go_full_screen(),
            WindowState::Normal => self.remote.leave_full_screen(),
        }
    }

    // === Teardown ===

    /// A second call finds nothing left to do.
    fn shut_down(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.registry.unsubscribe(subscription);
        }
        self.echoes.clear();
        match self.status {
            ConnectionStatus::Connected => {
                self.close_remote();
                self.enter_disconnected();
            }
            ConnectionStatus::Connecting => {
                self.remote.disconnect();
                self.enter_disconnected();
            }
            ConnectionStatus::Disconnected => {}
        }
        self.directory.remove(self.tree_id);
    }

    /// The session window is closing. An active session is disconnected and
    /// the `Disconnect` fact is still published so other views stay correct.
    /// Dropping the controller does the same.
    pub fn close(mut self) {
        self.shut_down();
    }
}

impl<R: RemoteSession, S: SessionSurface> Drop for SessionController<R, S> {
    fn drop(&mut self) {
        self.shut_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{FakeRemote, FakeSurface, RemoteCall, SurfaceCall};
    use rdpdeck_core::{ConnectionStateChanged, DesktopSize, NodeKind, SessionSettings};

    struct Harness {
        registry: Rc<SettingsRegistry>,
        directory: SessionDirectory,
        remote: FakeRemote,
        surface: FakeSurface,
        events: EventQueue,
        tree_id: TreeId,
    }

    impl Harness {
        fn new(desktop_size: DesktopSize) -> Self {
            let registry = Rc::new(SettingsRegistry::in_memory());
            let folder = registry.add_node(None, NodeKind::Folder, "Servers").unwrap();
            let client = registry
                .add_client(
                    Some(folder.id),
                    "db1",
                    SessionSettings {
                        desktop_size,
                        ..SessionSettings::for_host("10.0.0.5")
                    },
                )
                .unwrap();
            let events = EventQueue::new();
            registry.subscribe(Rc::new(events.clone()));
            Self {
                registry,
                directory: SessionDirectory::new(),
                remote: FakeRemote::new(),
                surface: FakeSurface::new(Size::new(800, 600)),
                events,
                tree_id: client.id,
            }
        }

        fn open(&self, options: SessionOptions) -> SessionController<FakeRemote, FakeSurface> {
            SessionController::new(
                self.tree_id,
                self.registry.clone(),
                self.directory.clone(),
                self.remote.clone(),
                self.surface.clone(),
                options,
            )
            .unwrap()
        }

        fn connected(&self) -> SessionController<FakeRemote, FakeSurface> {
            let mut session = self.open(SessionOptions::default());
            session.connect().unwrap();
            session.on_connected();
            self.events.drain();
            session
        }

        fn facts(&self, intent: ConnectionIntent) -> usize {
            self.events
                .drain()
                .into_iter()
                .filter(|e| {
                    *e == RegistryEvent::ConnectionStateChanged(ConnectionStateChanged {
                        tree_id: self.tree_id,
                        intent,
                    })
                })
                .count()
        }
    }

    #[test]
    fn connect_then_success_reaches_connected() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(h.surface.calls()[0], SurfaceCall::Caption("db1 - Terminal Client".into()));

        session.connect().unwrap();
        assert_eq!(session.status(), ConnectionStatus::Connecting);
        assert_eq!(h.directory.status(h.tree_id), Some(ConnectionStatus::Connecting));
        // Entering Connecting publishes nothing
        assert_eq!(h.facts(ConnectionIntent::Connect), 0);

        session.on_connected();
        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert_eq!(h.facts(ConnectionIntent::Connect), 1);
        assert!(h.surface.calls().contains(&SurfaceCall::Connected(true, ClientIcon::Classic)));

        match &h.remote.calls()[0] {
            RemoteCall::Connect(request) => {
                assert_eq!(request.target, "10.0.0.5");
                assert_eq!(request.options.desktop_size, Size::new(800, 600));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn duplicate_connect_while_connecting_is_ignored() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        session.connect().unwrap();
        h.registry.request_state(h.tree_id, ConnectionIntent::Connect);
        session.pump_events();
        session.connect().unwrap();
        assert_eq!(session.status(), ConnectionStatus::Connecting);
        assert_eq!(h.remote.count(|c| matches!(c, RemoteCall::Connect(_))), 1);

        h.events.drain();
        session.on_connected();
        session.on_connected();
        assert_eq!(h.facts(ConnectionIntent::Connect), 1);
    }

    #[test]
    fn connect_requested_while_connecting_is_not_replayed_after_failure() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        session.connect().unwrap();
        h.registry.request_state(h.tree_id, ConnectionIntent::Connect);
        assert!(session
            .on_disconnected(DisconnectReason::new(516))
            .is_some());

        session.pump_events();
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(h.remote.count(|c| matches!(c, RemoteCall::Connect(_))), 1);
    }

    #[test]
    fn connect_requested_while_connected_is_not_replayed_after_close() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.connected();
        h.registry.request_state(h.tree_id, ConnectionIntent::Connect);
        session.on_disconnected(DisconnectReason::new(DisconnectReason::REMOTE_BY_USER));

        session.pump_events();
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(h.remote.count(|c| matches!(c, RemoteCall::Connect(_))), 1);

        // A request made once disconnected is honoured
        h.registry.request_state(h.tree_id, ConnectionIntent::Connect);
        session.pump_events();
        assert_eq!(session.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn intents_for_other_ids_are_ignored() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        h.registry.request_state(TreeId(999), ConnectionIntent::Connect);
        session.pump_events();
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert!(h.remote.calls().is_empty());
    }

    #[test]
    fn connect_intent_through_registry() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        h.registry.request_state(h.tree_id, ConnectionIntent::Connect);
        session.pump_events();
        assert_eq!(session.status(), ConnectionStatus::Connecting);

        session.on_connected();
        // The echo of our own Connect fact is not treated as a new request
        session.pump_events();
        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert_eq!(h.remote.count(|c| matches!(c, RemoteCall::Connect(_))), 1);
    }

    #[test]
    fn same_as_client_resize_renegotiates_once() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.connected();
        h.remote.calls.borrow_mut().clear();

        session.on_surface_resized(Size::new(1024, 768));
        assert_eq!(h.remote.calls(), vec![RemoteCall::SetDesktopSize(Size::new(1024, 768))]);
        assert_eq!(
            h.remote.count(|c| matches!(c, RemoteCall::GoFullScreen | RemoteCall::LeaveFullScreen)),
            0
        );
    }

    #[test]
    fn resize_is_ignored_unless_connected_and_tracking() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        session.on_surface_resized(Size::new(1024, 768));
        session.connect().unwrap();
        session.on_surface_resized(Size::new(1024, 768));
        assert_eq!(h.remote.count(|c| matches!(c, RemoteCall::SetDesktopSize(_))), 0);

        let fixed = Harness::new(DesktopSize::fixed(1280, 1024));
        let mut session = fixed.connected();
        session.on_surface_resized(Size::new(1024, 768));
        assert_eq!(fixed.remote.count(|c| matches!(c, RemoteCall::SetDesktopSize(_))), 0);
    }

    #[test]
    fn full_screen_mode_starts_full_screen() {
        let h = Harness::new(DesktopSize::FullScreen);
        let mut session = h.open(SessionOptions::default());
        session.connect().unwrap();
        assert_eq!(
            session.negotiation(),
            Some(DesktopNegotiation::FullScreen(Size::new(1920, 1040)))
        );
        match &h.remote.calls()[0] {
            RemoteCall::Connect(request) => assert!(request.options.full_screen),
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn disconnect_request_publishes_once() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.connected();
        h.registry.request_state(h.tree_id, ConnectionIntent::Disconnect);
        session.pump_events();
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(h.remote.count(|c| *c == RemoteCall::RequestClose), 1);
        // The intent plus the controller's fact
        assert_eq!(h.facts(ConnectionIntent::Disconnect), 2);

        // The remote's late notification changes nothing
        assert_eq!(session.on_disconnected(DisconnectReason::new(DisconnectReason::LOCAL)), None);
        session.disconnect();
        assert_eq!(h.facts(ConnectionIntent::Disconnect), 0);
    }

    #[test]
    fn legacy_remote_is_disconnected() {
        let mut h = Harness::new(DesktopSize::SameAsClient);
        h.remote = FakeRemote::legacy();
        let mut session = h.connected();
        session.disconnect();
        assert_eq!(h.remote.count(|c| *c == RemoteCall::Disconnect), 1);
        assert_eq!(h.remote.count(|c| *c == RemoteCall::RequestClose), 0);
    }

    #[test]
    fn disconnect_while_connecting_is_a_no_op() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        session.connect().unwrap();
        h.events.drain();
        session.disconnect();
        assert_eq!(session.status(), ConnectionStatus::Connecting);
        assert_eq!(h.facts(ConnectionIntent::Disconnect), 0);
    }

    #[test]
    fn focus_only_when_connected() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        session.focus();
        assert!(!h.surface.calls().contains(&SurfaceCall::Focus));

        session.connect().unwrap();
        session.on_connected();
        h.registry.request_state(h.tree_id, ConnectionIntent::Focus);
        session.pump_events();
        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert_eq!(h.surface.calls().iter().filter(|c| **c == SurfaceCall::Focus).count(), 1);
    }

    #[test]
    fn failure_while_connecting_is_reported() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        session.connect().unwrap();
        h.events.drain();

        let error = session
            .on_disconnected(DisconnectReason::new(DisconnectReason::REMOTE_BY_SERVER))
            .unwrap();
        assert_eq!(error.code, 3);
        assert_eq!(error.target, "10.0.0.5");
        assert_eq!(error.description, "error 3");
        assert_eq!(session.last_error(), Some(&error));
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(h.facts(ConnectionIntent::Disconnect), 1);

        // No automatic retry
        assert_eq!(h.remote.count(|c| matches!(c, RemoteCall::Connect(_))), 1);
        // A new attempt clears the error
        session.connect().unwrap();
        assert_eq!(session.last_error(), None);
    }

    #[test]
    fn remote_close_while_connected() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.connected();
        assert_eq!(session.on_disconnected(DisconnectReason::new(DisconnectReason::REMOTE_BY_USER)), None);
        assert_eq!(session.status(), ConnectionStatus::Disconnected);
        assert_eq!(h.facts(ConnectionIntent::Disconnect), 1);
        assert!(!h.surface.calls().contains(&SurfaceCall::RequestClose));

        let mut session = {
            drop(session);
            let mut s = h.open(SessionOptions {
                close_window_after_disconnect: true,
                ..SessionOptions::default()
            });
            s.connect().unwrap();
            s.on_connected();
            s
        };
        let error = session.on_disconnected(DisconnectReason::new(264));
        assert_eq!(error.map(|e| e.code), Some(264));
        assert!(h.surface.calls().contains(&SurfaceCall::RequestClose));
    }

    #[test]
    fn close_while_connected_publishes_exactly_one_disconnect() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let session = h.connected();
        assert_eq!(h.registry.subscriber_count(), 2);

        session.close();
        assert_eq!(h.facts(ConnectionIntent::Disconnect), 1);
        assert_eq!(h.remote.count(|c| *c == RemoteCall::RequestClose), 1);
        assert_eq!(h.directory.status(h.tree_id), None);
        assert_eq!(h.registry.subscriber_count(), 1);
    }

    #[test]
    fn close_while_connecting_aborts() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        session.connect().unwrap();
        h.events.drain();
        session.close();
        assert_eq!(h.remote.count(|c| *c == RemoteCall::Disconnect), 1);
        assert_eq!(h.facts(ConnectionIntent::Disconnect), 1);
    }

    #[test]
    fn close_while_disconnected_is_silent() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let session = h.open(SessionOptions::default());
        h.events.drain();
        session.close();
        assert!(h.events.is_empty());
        assert!(h.remote.calls().is_empty());
        assert!(h.directory.is_empty());
    }

    #[test]
    fn window_state_toggles_full_screen() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.connected();
        h.remote.calls.borrow_mut().clear();

        session.on_window_state_changed(WindowState::Maximized);
        session.on_window_state_changed(WindowState::Maximized);
        session.on_window_state_changed(WindowState::Normal);
        assert_eq!(
            h.remote.calls(),
            vec![RemoteCall::GoFullScreen, RemoteCall::LeaveFullScreen]
        );

        session.on_window_state_changed(WindowState::Maximized);
        session.on_request_leave_full_screen();
        assert_eq!(session.window_state(), WindowState::Normal);
        session.on_window_state_changed(WindowState::Maximized);
        assert_eq!(h.remote.count(|c| *c == RemoteCall::GoFullScreen), 3);
    }

    #[test]
    fn rename_updates_caption_and_delete_closes_window() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        h.registry.rename_node(h.tree_id, "db-primary").unwrap();
        session.pump_events();
        assert!(h
            .surface
            .calls()
            .contains(&SurfaceCall::Caption("db-primary - Terminal Client".into())));

        h.registry.delete_node(h.tree_id).unwrap();
        session.pump_events();
        assert_eq!(h.surface.calls().last(), Some(&SurfaceCall::RequestClose));
    }

    #[test]
    fn opening_requires_a_single_client_session() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let _session = h.open(SessionOptions::default());
        let second = SessionController::new(
            h.tree_id,
            h.registry.clone(),
            h.directory.clone(),
            FakeRemote::new(),
            FakeSurface::new(Size::new(10, 10)),
            SessionOptions::default(),
        );
        assert!(matches!(second, Err(TreeError::InvalidOperation(_))));

        let folder = SessionController::new(
            TreeId(1),
            h.registry.clone(),
            SessionDirectory::new(),
            FakeRemote::new(),
            FakeSurface::new(Size::new(10, 10)),
            SessionOptions::default(),
        );
        assert!(matches!(folder, Err(TreeError::InvalidOperation(_))));

        let missing = SessionController::new(
            TreeId(77),
            h.registry.clone(),
            SessionDirectory::new(),
            FakeRemote::new(),
            FakeSurface::new(Size::new(10, 10)),
            SessionOptions::default(),
        );
        assert!(matches!(missing, Err(TreeError::NotFound(_))));
    }

    #[test]
    fn dropping_a_connected_controller_disconnects() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let session = h.connected();
        drop(session);
        assert_eq!(h.remote.count(|c| *c == RemoteCall::RequestClose), 1);
        assert_eq!(h.facts(ConnectionIntent::Disconnect), 1);
        assert!(h.directory.is_empty());
        assert_eq!(h.registry.subscriber_count(), 1);
    }

    #[test]
    fn dropping_a_connecting_controller_aborts() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let mut session = h.open(SessionOptions::default());
        session.connect().unwrap();
        h.events.drain();
        drop(session);
        assert_eq!(h.remote.count(|c| *c == RemoteCall::Disconnect), 1);
        assert_eq!(h.facts(ConnectionIntent::Disconnect), 1);
    }

    #[test]
    fn dropping_a_controller_releases_its_subscription() {
        let h = Harness::new(DesktopSize::SameAsClient);
        let session = h.open(SessionOptions::default());
        assert_eq!(h.registry.subscriber_count(), 2);
        drop(session);
        assert_eq!(h.registry.subscriber_count(), 1);
        assert!(h.directory.is_empty());
    }
}
