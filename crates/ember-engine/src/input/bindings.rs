use std::collections::HashMap;

use super::state::InputState;
use super::types::Key;

/// Named movement axes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Axis {
    MoveForward,
    MoveRight,
    MoveUp,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::MoveForward, Axis::MoveRight, Axis::MoveUp];
}

/// Two keys driving one axis toward +1 and -1.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AxisBinding {
    pub positive: Key,
    pub negative: Key,
}

#[derive(Debug, Clone)]
pub struct AxisBindings {
    map: HashMap<Axis, AxisBinding>,
}

impl Default for AxisBindings {
    /// W/S forward, D/A right, E/Q up.
    fn default() -> Self {
        let mut bindings = Self {
            map: HashMap::new(),
        };
        bindings.bind(Axis::MoveForward, Key::W, Key::S);
        bindings.bind(Axis::MoveRight, Key::D, Key::A);
        bindings.bind(Axis::MoveUp, Key::E, Key::Q);
        bindings
    }
}

impl AxisBindings {
    pub fn bind(&mut self, axis: Axis, positive: Key, negative: Key) {
        self.map.insert(axis, AxisBinding { positive, negative });
    }

    pub fn binding(&self, axis: Axis) -> Option<AxisBinding> {
        self.map.get(&axis).copied()
    }

    /// Axis value in -1..=1; opposing keys cancel out.
    pub fn value(&self, state: &InputState, axis: Axis) -> f32 {
        let Some(b) = self.map.get(&axis) else {
            return 0.0;
        };
        let pos = if state.key_down(b.positive) { 1.0 } else { 0.0 };
        let neg = if state.key_down(b.negative) { 1.0 } else { 0.0 };
        pos - neg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_axes_follow_wasd_eq() {
        let bindings = AxisBindings::default();
        let mut state = InputState::default();
        state.keys_down.insert(Key::S);
        state.keys_down.insert(Key::D);

        assert_eq!(bindings.value(&state, Axis::MoveForward), -1.0);
        assert_eq!(bindings.value(&state, Axis::MoveRight), 1.0);
        assert_eq!(bindings.value(&state, Axis::MoveUp), 0.0);

        state.keys_down.insert(Key::W);
        assert_eq!(bindings.value(&state, Axis::MoveForward), 0.0);
    }

    #[test]
    fn rebinding_replaces_keys() {
        let mut bindings = AxisBindings::default();
        bindings.bind(Axis::MoveUp, Key::Space, Key::Control);
        let mut state = InputState::default();
        state.keys_down.insert(Key::Space);
        assert_eq!(bindings.value(&state, Axis::MoveUp), 1.0);
        assert_eq!(bindings.binding(Axis::MoveUp).map(|b| b.negative), Some(Key::Control));
    }
}
