//! # Controller Input Mapper Module
//!
//! This module handles parsing raw evdev events from a gamepad and folding
//! them into a [`RawSample`], the per-poll reading consumed by the
//! normalizer and the calibration routine.
//!
//! ## Axis Layouts
//!
//! | Role | DualSense | Xbox | Native range |
//! |------|-----------|------|--------------|
//! | Left stick X/Y | ABS_X / ABS_Y | ABS_X / ABS_Y | [-1, 1] |
//! | Right stick X/Y | ABS_Z / ABS_RZ | ABS_RX / ABS_RY | [-1, 1] |
//! | Left trigger | ABS_RX | ABS_Z | [-1, 1], -1 released |
//! | Right trigger | ABS_RY | ABS_RZ | [-1, 1], -1 released |
//! | D-Pad | ABS_HAT0X / ABS_HAT0Y | same | -1/0/1, +Y up |
//!
//! Stick Y grows downward, as the device reports it.
//!
//! ## Button Codes (EV_KEY)
//!
//! Buttons are named by position, so `a` is the bottom face button on both
//! pads (Cross on a DualSense).
//!
//! | Button | evdev Code |
//! |--------|------------|
//! | a / b / x / y | BTN_SOUTH / BTN_EAST / BTN_WEST / BTN_NORTH |
//! | left / right bumper | BTN_TL / BTN_TR |
//! | back / start / home | BTN_SELECT / BTN_START / BTN_MODE |
//! | left / right stick click | BTN_THUMBL / BTN_THUMBR |

use evdev::{AbsoluteAxisType, InputEvent, Key};
use tracing::warn;

use super::range::{is_degenerate, map_ranges, CANONICAL};

/// Digital button states, sampled as-is with no debouncing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub a: bool,
    pub b: bool,
    pub x: bool,
    pub y: bool,
    pub left_bumper: bool,
    pub right_bumper: bool,
    pub back: bool,
    pub start: bool,
    pub home: bool,
    pub left_stick: bool,
    pub right_stick: bool,
}

impl Buttons {
    /// Checks if any button is currently pressed.
    #[must_use]
    pub fn any_pressed(&self) -> bool {
        self.a
            || self.b
            || self.x
            || self.y
            || self.left_bumper
            || self.right_bumper
            || self.back
            || self.start
            || self.home
            || self.left_stick
            || self.right_stick
    }
}

/// One raw reading of the controller.
///
/// Analog values are in the device's native [-1, 1] range but are not yet
/// corrected for center drift or deadzone.
///
/// # Examples
///
/// ```
/// use rov_pilot::controller::mapper::RawSample;
///
/// let sample = RawSample::default();
/// assert_eq!(sample.left_x, 0.0);
/// assert_eq!(sample.left_trigger, -1.0); // Released
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub left_x: f32,
    pub left_y: f32,
    pub right_x: f32,
    pub right_y: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
    /// D-Pad X. -1 = left, 1 = right.
    pub hat_x: i8,
    /// D-Pad Y. -1 = down, 1 = up.
    pub hat_y: i8,
    pub buttons: Buttons,
}

impl Default for RawSample {
    fn default() -> Self {
        Self {
            left_x: 0.0,
            left_y: 0.0,
            right_x: 0.0,
            right_y: 0.0,
            left_trigger: -1.0,
            right_trigger: -1.0,
            hat_x: 0,
            hat_y: 0,
            buttons: Buttons::default(),
        }
    }
}

impl RawSample {
    /// Stick readings in [`StickAxis::ALL`](super::profile::StickAxis::ALL) order.
    #[must_use]
    pub fn sticks(&self) -> [f32; 4] {
        [self.left_x, self.left_y, self.right_x, self.right_y]
    }

    /// Checks if any stick axis deviates from zero by more than `threshold`.
    #[must_use]
    pub fn any_stick_moved(&self, threshold: f32) -> bool {
        self.sticks().iter().any(|v| v.abs() > threshold)
    }
}

/// Analog inputs the mapper tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    LeftX,
    LeftY,
    RightX,
    RightY,
    LeftTrigger,
    RightTrigger,
}

impl AxisRole {
    /// All analog roles.
    pub const ALL: [AxisRole; 6] = [
        AxisRole::LeftX,
        AxisRole::LeftY,
        AxisRole::RightX,
        AxisRole::RightY,
        AxisRole::LeftTrigger,
        AxisRole::RightTrigger,
    ];

    fn index(self) -> usize {
        match self {
            AxisRole::LeftX => 0,
            AxisRole::LeftY => 1,
            AxisRole::RightX => 2,
            AxisRole::RightY => 3,
            AxisRole::LeftTrigger => 4,
            AxisRole::RightTrigger => 5,
        }
    }
}

/// Which evdev codes carry the right stick and the triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisLayout {
    /// Sony DualSense (hid-playstation driver).
    DualSense,
    /// Microsoft Xbox pads (xpad / hid-microsoft drivers).
    Xbox,
}

impl AxisLayout {
    /// evdev axis code for an analog role.
    #[must_use]
    pub fn axis_code(self, role: AxisRole) -> AbsoluteAxisType {
        match (self, role) {
            (_, AxisRole::LeftX) => AbsoluteAxisType::ABS_X,
            (_, AxisRole::LeftY) => AbsoluteAxisType::ABS_Y,
            (AxisLayout::DualSense, AxisRole::RightX) => AbsoluteAxisType::ABS_Z,
            (AxisLayout::DualSense, AxisRole::RightY) => AbsoluteAxisType::ABS_RZ,
            (AxisLayout::DualSense, AxisRole::LeftTrigger) => AbsoluteAxisType::ABS_RX,
            (AxisLayout::DualSense, AxisRole::RightTrigger) => AbsoluteAxisType::ABS_RY,
            (AxisLayout::Xbox, AxisRole::RightX) => AbsoluteAxisType::ABS_RX,
            (AxisLayout::Xbox, AxisRole::RightY) => AbsoluteAxisType::ABS_RY,
            (AxisLayout::Xbox, AxisRole::LeftTrigger) => AbsoluteAxisType::ABS_Z,
            (AxisLayout::Xbox, AxisRole::RightTrigger) => AbsoluteAxisType::ABS_RZ,
        }
    }

    /// Native raw range of an analog role, used until the device reports its own.
    #[must_use]
    pub fn default_range(self, role: AxisRole) -> (f32, f32) {
        match (self, role) {
            (AxisLayout::DualSense, _) => (0.0, 255.0),
            (AxisLayout::Xbox, AxisRole::LeftTrigger | AxisRole::RightTrigger) => (0.0, 1023.0),
            (AxisLayout::Xbox, _) => (-32768.0, 32767.0),
        }
    }

    fn role_of(self, axis: AbsoluteAxisType) -> Option<AxisRole> {
        AxisRole::ALL
            .into_iter()
            .find(|role| self.axis_code(*role) == axis)
    }
}

/// Parses raw evdev events and maintains the latest [`RawSample`].
///
/// # Thread Safety
///
/// `EventMapper` is not thread-safe. Use from a single task/thread only.
///
/// # Examples
///
/// ```
/// use rov_pilot::controller::mapper::{AxisLayout, EventMapper};
///
/// let mapper = EventMapper::new(AxisLayout::DualSense);
/// assert_eq!(mapper.sample().right_trigger, -1.0);
/// ```
#[derive(Debug, Clone)]
pub struct EventMapper {
    layout: AxisLayout,
    ranges: [(f32, f32); 6],
    sample: RawSample,
}

impl EventMapper {
    /// Creates a mapper using the layout's default raw ranges.
    #[must_use]
    pub fn new(layout: AxisLayout) -> Self {
        let mut ranges = [(0.0, 0.0); 6];
        for role in AxisRole::ALL {
            ranges[role.index()] = layout.default_range(role);
        }
        Self {
            layout,
            ranges,
            sample: RawSample::default(),
        }
    }

    /// Returns the axis layout in use.
    #[must_use]
    pub fn layout(&self) -> AxisLayout {
        self.layout
    }

    /// Overrides the raw range of one axis, usually from the device's absinfo.
    ///
    /// A zero-width range is ignored and the layout default is kept.
    pub fn set_range(&mut self, role: AxisRole, min: i32, max: i32) {
        let range = (min as f32, max as f32);
        if is_degenerate(range) {
            warn!(
                "Device reports zero-width range [{}, {}] for {:?}, keeping default",
                min, max, role
            );
            return;
        }
        self.ranges[role.index()] = range;
    }

    /// Returns the current sample.
    #[must_use]
    pub fn sample(&self) -> &RawSample {
        &self.sample
    }

    /// Processes a single evdev input event and updates the sample.
    ///
    /// Sync events and unknown codes are ignored.
    pub fn process_event(&mut self, event: &InputEvent) {
        match event.kind() {
            evdev::InputEventKind::AbsAxis(axis) => {
                self.process_axis_event(axis, event.value());
            }
            evdev::InputEventKind::Key(key) => {
                self.process_key_event(key, event.value() != 0);
            }
            _ => {}
        }
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) {
        match axis {
            AbsoluteAxisType::ABS_HAT0X => self.sample.hat_x = value.signum() as i8,
            // evdev reports up as -1
            AbsoluteAxisType::ABS_HAT0Y => self.sample.hat_y = -(value.signum() as i8),
            _ => {
                let Some(role) = self.layout.role_of(axis) else {
                    // Gyro, accelerometer, etc.
                    return;
                };
                let native = self.to_native(role, value);
                match role {
                    AxisRole::LeftX => self.sample.left_x = native,
                    AxisRole::LeftY => self.sample.left_y = native,
                    AxisRole::RightX => self.sample.right_x = native,
                    AxisRole::RightY => self.sample.right_y = native,
                    AxisRole::LeftTrigger => self.sample.left_trigger = native,
                    AxisRole::RightTrigger => self.sample.right_trigger = native,
                }
            }
        }
    }

    fn to_native(&self, role: AxisRole, value: i32) -> f32 {
        map_ranges(value as f32, self.ranges[role.index()], CANONICAL)
            .map(|v| v.clamp(-1.0, 1.0))
            .unwrap_or(0.0)
    }

    fn process_key_event(&mut self, key: Key, pressed: bool) {
        let buttons = &mut self.sample.buttons;
        match key {
            Key::BTN_SOUTH => buttons.a = pressed,
            Key::BTN_EAST => buttons.b = pressed,
            Key::BTN_WEST => buttons.x = pressed,
            Key::BTN_NORTH => buttons.y = pressed,
            Key::BTN_TL => buttons.left_bumper = pressed,
            Key::BTN_TR => buttons.right_bumper = pressed,
            Key::BTN_SELECT => buttons.back = pressed,
            Key::BTN_START => buttons.start = pressed,
            Key::BTN_MODE => buttons.home = pressed,
            Key::BTN_THUMBL => buttons.left_stick = pressed,
            Key::BTN_THUMBR => buttons.right_stick = pressed,
            _ => {}
        }
    }

    /// Resets the sample to rest (centered sticks, released triggers and buttons).
    pub fn reset(&mut self) {
        self.sample = RawSample::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    /// Helper to create an axis event for testing.
    fn make_axis_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    /// Helper to create a key event for testing.
    fn make_key_event(key: Key, pressed: bool) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), if pressed { 1 } else { 0 })
    }

    // ==================== RawSample Tests ====================

    #[test]
    fn test_raw_sample_default() {
        let sample = RawSample::default();
        assert_eq!(sample.sticks(), [0.0; 4]);
        assert_eq!(sample.left_trigger, -1.0);
        assert_eq!(sample.right_trigger, -1.0);
        assert_eq!((sample.hat_x, sample.hat_y), (0, 0));
        assert!(!sample.buttons.any_pressed());
    }

    #[test]
    fn test_any_stick_moved() {
        let mut sample = RawSample::default();
        assert!(!sample.any_stick_moved(0.1));

        sample.right_y = -0.05;
        assert!(!sample.any_stick_moved(0.1));

        sample.right_y = -0.5;
        assert!(sample.any_stick_moved(0.1));
    }

    #[test]
    fn test_any_button_pressed() {
        let mut buttons = Buttons::default();
        assert!(!buttons.any_pressed());
        buttons.home = true;
        assert!(buttons.any_pressed());
    }

    // ==================== Layout Tests ====================

    #[test]
    fn test_layout_codes_differ_for_right_stick() {
        assert_eq!(
            AxisLayout::DualSense.axis_code(AxisRole::RightX),
            AbsoluteAxisType::ABS_Z
        );
        assert_eq!(
            AxisLayout::Xbox.axis_code(AxisRole::RightX),
            AbsoluteAxisType::ABS_RX
        );
    }

    #[test]
    fn test_layout_roles_are_unique() {
        for layout in [AxisLayout::DualSense, AxisLayout::Xbox] {
            for role in AxisRole::ALL {
                assert_eq!(layout.role_of(layout.axis_code(role)), Some(role));
            }
        }
    }

    // ==================== Axis Event Tests ====================

    #[test]
    fn test_dualsense_stick_extremes() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 0));
        assert_eq!(mapper.sample().left_x, -1.0);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 255));
        assert_eq!(mapper.sample().left_x, 1.0);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RZ, 255));
        assert_eq!(mapper.sample().right_y, 1.0);
    }

    #[test]
    fn test_dualsense_stick_center_is_near_zero() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Y, 128));
        assert!(mapper.sample().left_y.abs() < 0.01);
    }

    #[test]
    fn test_dualsense_triggers() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RY, 255));
        assert_eq!(mapper.sample().right_trigger, 1.0);
        assert_eq!(mapper.sample().left_trigger, -1.0);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RX, 0));
        assert_eq!(mapper.sample().left_trigger, -1.0);
    }

    #[test]
    fn test_xbox_layout() {
        let mut mapper = EventMapper::new(AxisLayout::Xbox);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RX, -32768));
        assert_eq!(mapper.sample().right_x, -1.0);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_RZ, 1023));
        assert_eq!(mapper.sample().right_trigger, 1.0);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_Z, 0));
        assert_eq!(mapper.sample().left_trigger, -1.0);
    }

    #[test]
    fn test_out_of_range_value_is_clamped() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 400));
        assert_eq!(mapper.sample().left_x, 1.0);
    }

    #[test]
    fn test_set_range_from_device() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);
        mapper.set_range(AxisRole::LeftX, -100, 100);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 100));
        assert_eq!(mapper.sample().left_x, 1.0);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 0));
        assert!(mapper.sample().left_x.abs() < 1e-6);
    }

    #[test]
    fn test_set_range_ignores_zero_width() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);
        mapper.set_range(AxisRole::LeftX, 7, 7);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 255));
        assert_eq!(mapper.sample().left_x, 1.0);
    }

    #[test]
    fn test_unknown_axis_ignored() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_PRESSURE, 99));
        assert_eq!(*mapper.sample(), RawSample::default());
    }

    // ==================== D-Pad Tests ====================

    #[test]
    fn test_dpad_y_is_flipped() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, -1));
        assert_eq!(mapper.sample().hat_y, 1);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, 1));
        assert_eq!(mapper.sample().hat_y, -1);

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, 0));
        assert_eq!(mapper.sample().hat_y, 0);
    }

    #[test]
    fn test_dpad_x() {
        let mut mapper = EventMapper::new(AxisLayout::Xbox);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, -1));
        assert_eq!(mapper.sample().hat_x, -1);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, 1));
        assert_eq!(mapper.sample().hat_x, 1);
    }

    // ==================== Button Tests ====================

    #[test]
    fn test_face_buttons_by_position() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);

        mapper.process_event(&make_key_event(Key::BTN_SOUTH, true));
        mapper.process_event(&make_key_event(Key::BTN_NORTH, true));
        let buttons = mapper.sample().buttons;
        assert!(buttons.a);
        assert!(buttons.y);
        assert!(!buttons.b);
        assert!(!buttons.x);

        mapper.process_event(&make_key_event(Key::BTN_SOUTH, false));
        assert!(!mapper.sample().buttons.a);
    }

    #[test]
    fn test_system_and_stick_buttons() {
        let mut mapper = EventMapper::new(AxisLayout::Xbox);
        for key in [
            Key::BTN_TL,
            Key::BTN_TR,
            Key::BTN_SELECT,
            Key::BTN_START,
            Key::BTN_MODE,
            Key::BTN_THUMBL,
            Key::BTN_THUMBR,
        ] {
            mapper.process_event(&make_key_event(key, true));
        }

        let buttons = mapper.sample().buttons;
        assert!(buttons.left_bumper && buttons.right_bumper);
        assert!(buttons.back && buttons.start && buttons.home);
        assert!(buttons.left_stick && buttons.right_stick);
    }

    #[test]
    fn test_reset() {
        let mut mapper = EventMapper::new(AxisLayout::DualSense);
        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_X, 200));
        mapper.process_event(&make_key_event(Key::BTN_EAST, true));

        mapper.reset();
        assert_eq!(*mapper.sample(), RawSample::default());
    }
}
