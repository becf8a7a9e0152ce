use serde::{Deserialize, Serialize};

/// Pixel dimensions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Component-wise minimum.
    pub fn min(self, other: Size) -> Size {
        Size::new(self.width.min(other.width), self.height.min(other.height))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// One physical display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screen {
    pub bounds: Rect,
    /// Bounds minus task bars and docks
    pub working_area: Rect,
    pub primary: bool,
}

/// Displays available to the environment hosting a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayTopology {
    pub screens: Vec<Screen>,
}

impl DisplayTopology {
    pub fn single(bounds: Rect, working_area: Rect) -> Self {
        Self {
            screens: vec![Screen {
                bounds,
                working_area,
                primary: true,
            }],
        }
    }

    /// The primary screen, falling back to the first one listed.
    pub fn primary(&self) -> Option<&Screen> {
        self.screens
            .iter()
            .find(|s| s.primary)
            .or_else(|| self.screens.first())
    }
}
