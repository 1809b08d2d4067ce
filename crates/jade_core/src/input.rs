//! Keyboard and mouse state fed by the window's input callbacks.
//!
//! - **Level-triggered (held):** `is_held(key)` is true every frame the key
//!   is physically down.
//! - **Edge-triggered (just_pressed / just_released):** true only during the
//!   frame the transition happened; cleared by `end_frame()`.
//!
//! Mouse tracking mirrors the classic listener model: current and previous
//! cursor position, accumulated scroll for the frame, and a dragging flag that
//! is raised when the cursor moves while any button is down.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Left,
    Right,
    Up,
    Down,
    Escape,
    Space,
    Enter,
    W,
    A,
    S,
    D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseBtn {
    Left,
    Right,
    Middle,
}

pub struct InputState {
    held: HashSet<Key>,
    just_pressed: HashSet<Key>,
    just_released: HashSet<Key>,

    mouse_held: HashSet<MouseBtn>,
    mouse_just_pressed: HashSet<MouseBtn>,
    mouse_just_released: HashSet<MouseBtn>,

    pub mouse_position: (f64, f64),
    last_mouse_position: (f64, f64),
    scroll: (f64, f64),
    dragging: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            held: HashSet::new(),
            just_pressed: HashSet::new(),
            just_released: HashSet::new(),
            mouse_held: HashSet::new(),
            mouse_just_pressed: HashSet::new(),
            mouse_just_released: HashSet::new(),
            mouse_position: (0.0, 0.0),
            last_mouse_position: (0.0, 0.0),
            scroll: (0.0, 0.0),
            dragging: false,
        }
    }

    pub fn key_down(&mut self, key: Key) {
        if self.held.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    pub fn key_up(&mut self, key: Key) {
        if self.held.remove(&key) {
            self.just_released.insert(key);
        }
    }

    pub fn mouse_down(&mut self, btn: MouseBtn) {
        if self.mouse_held.insert(btn) {
            self.mouse_just_pressed.insert(btn);
        }
    }

    pub fn mouse_up(&mut self, btn: MouseBtn) {
        if self.mouse_held.remove(&btn) {
            self.mouse_just_released.insert(btn);
        }
        self.dragging = false;
    }

    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        self.last_mouse_position = self.mouse_position;
        self.mouse_position = (x, y);
        self.dragging = !self.mouse_held.is_empty();
    }

    pub fn scrolled(&mut self, dx: f64, dy: f64) {
        self.scroll.0 += dx;
        self.scroll.1 += dy;
    }

    pub fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }

    pub fn is_just_pressed(&self, key: Key) -> bool {
        self.just_pressed.contains(&key)
    }

    pub fn is_just_released(&self, key: Key) -> bool {
        self.just_released.contains(&key)
    }

    pub fn is_mouse_held(&self, btn: MouseBtn) -> bool {
        self.mouse_held.contains(&btn)
    }

    pub fn is_mouse_just_pressed(&self, btn: MouseBtn) -> bool {
        self.mouse_just_pressed.contains(&btn)
    }

    pub fn is_mouse_just_released(&self, btn: MouseBtn) -> bool {
        self.mouse_just_released.contains(&btn)
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    /// Cursor movement since the previous cursor event.
    pub fn mouse_delta(&self) -> (f64, f64) {
        (
            self.mouse_position.0 - self.last_mouse_position.0,
            self.mouse_position.1 - self.last_mouse_position.1,
        )
    }

    /// Scroll accumulated during the current frame.
    pub fn scroll_delta(&self) -> (f64, f64) {
        self.scroll
    }

    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.just_released.clear();
        self.mouse_just_pressed.clear();
        self.mouse_just_released.clear();
        self.scroll = (0.0, 0.0);
        self.last_mouse_position = self.mouse_position;
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}
