//! Recording doubles for the remote-session and surface capabilities.

use super::remote::{ConnectRequest, RemoteSession};
use super::surface::SessionSurface;
use rdpdeck_core::{ClientIcon, DisplayTopology, Rect, Size};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteCall {
    Connect(ConnectRequest),
    Disconnect,
    RequestClose,
    SetDesktopSize(Size),
    GoFullScreen,
    LeaveFullScreen,
}

#[derive(Clone, Default)]
pub struct FakeRemote {
    pub calls: Rc<RefCell<Vec<RemoteCall>>>,
    pub legacy: bool,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// A remote that can only be disconnected.
    pub fn legacy() -> Self {
        Self {
            legacy: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&RemoteCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }
}

impl RemoteSession for FakeRemote {
    fn connect(&mut self, request: &ConnectRequest) {
        self.calls.borrow_mut().push(RemoteCall::Connect(request.clone()));
    }

    fn disconnect(&mut self) {
        self.calls.borrow_mut().push(RemoteCall::Disconnect);
    }

    fn request_close(&mut self) {
        self.calls.borrow_mut().push(RemoteCall::RequestClose);
    }

    fn supports_request_close(&self) -> bool {
        !self.legacy
    }

    fn set_desktop_size(&mut self, size: Size) {
        self.calls.borrow_mut().push(RemoteCall::SetDesktopSize(size));
    }

    fn go_full_screen(&mut self) {
        self.calls.borrow_mut().push(RemoteCall::GoFullScreen);
    }

    fn leave_full_screen(&mut self) {
        self.calls.borrow_mut().push(RemoteCall::LeaveFullScreen);
    }

    fn get_error_description(&self, code: u32) -> String {
        format!("error {}", code)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SurfaceCall {
    Focus,
    Caption(String),
    Connected(bool, ClientIcon),
    RequestClose,
}

#[derive(Clone)]
pub struct FakeSurface {
    pub calls: Rc<RefCell<Vec<SurfaceCall>>>,
    pub size: Size,
    pub topology: DisplayTopology,
}

impl FakeSurface {
    pub fn new(size: Size) -> Self {
        Self {
            calls: Rc::new(RefCell::new(Vec::new())),
            size,
            topology: DisplayTopology::single(
                Rect::new(0, 0, 1920, 1080),
                Rect::new(0, 0, 1920, 1040),
            ),
        }
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.borrow().clone()
    }
}

impl SessionSurface for FakeSurface {
    fn client_size(&self) -> Size {
        self.size
    }

    fn display_topology(&self) -> DisplayTopology {
        self.topology.clone()
    }

    fn focus(&mut self) {
        self.calls.borrow_mut().push(SurfaceCall::Focus);
    }

    fn set_caption(&mut self, caption: &str) {
        self.calls.borrow_mut().push(SurfaceCall::Caption(caption.to_string()));
    }

    fn set_connected(&mut self, connected: bool, icon: ClientIcon) {
        self.calls.borrow_mut().push(SurfaceCall::Connected(connected, icon));
    }

    fn request_close(&mut self) {
        self.calls.borrow_mut().push(SurfaceCall::RequestClose);
    }
}
