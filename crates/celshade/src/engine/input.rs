use std::collections::HashSet;

use glam::Vec4;

/// Keys that steer a drawable object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Q,
    E,
    Z,
    C,
}

/// Snapshot of the keys currently held down.
#[derive(Clone, Debug, Default)]
pub struct InputState {
    pressed: HashSet<Key>,
}

impl InputState {
    pub fn press(&mut self, key: Key) {
        self.pressed.insert(key);
    }

    pub fn release(&mut self, key: Key) {
        self.pressed.remove(&key);
    }

    pub fn set(&mut self, key: Key, is_pressed: bool) {
        if is_pressed {
            self.press(key);
        } else {
            self.release(key);
        }
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed.contains(&key)
    }
}

/// Accumulates held keys into movement along x, y, z and yaw in w. Not normalized.
pub fn movement_vector(input: &InputState) -> Vec4 {
    const BINDINGS: [(Key, Vec4); 8] = [
        (Key::Up, Vec4::new(0.0, 0.0, -1.0, 0.0)),
        (Key::Down, Vec4::new(0.0, 0.0, 1.0, 0.0)),
        (Key::Left, Vec4::new(-1.0, 0.0, 0.0, 0.0)),
        (Key::Right, Vec4::new(1.0, 0.0, 0.0, 0.0)),
        (Key::Q, Vec4::new(0.0, -1.0, 0.0, 0.0)),
        (Key::E, Vec4::new(0.0, 1.0, 0.0, 0.0)),
        (Key::Z, Vec4::new(0.0, 0.0, 0.0, -1.0)),
        (Key::C, Vec4::new(0.0, 0.0, 0.0, 1.0)),
    ];
    BINDINGS
        .iter()
        .filter(|(key, _)| input.is_pressed(*key))
        .map(|(_, direction)| *direction)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_keys_cancel() {
        let mut input = InputState::default();
        input.press(Key::Up);
        input.press(Key::Down);
        input.press(Key::Right);
        input.press(Key::C);
        assert_eq!(movement_vector(&input), Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn release_removes_key() {
        let mut input = InputState::default();
        input.set(Key::Q, true);
        assert!(input.is_pressed(Key::Q));
        input.set(Key::Q, false);
        assert_eq!(movement_vector(&input), Vec4::ZERO);
    }
}
