//! Auto-fill strategy resolution.

use crate::settings::{FocusMode, InputStrategy, Settings};

/// Follow-up strategy after the code is on the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Disabled,
    /// Broadcast the code to the focus agent.
    AccessibilityAutoFill,
    /// Type the code with a privileged keystroke.
    PrivilegedKeystroke,
}

impl Strategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::AccessibilityAutoFill => "accessibility",
            Self::PrivilegedKeystroke => "privileged_keystroke",
        }
    }
}

/// Pure mapping from a settings snapshot to a [`Strategy`].
pub struct ModeResolver;

impl ModeResolver {
    pub fn resolve(settings: &Settings) -> Strategy {
        if !settings.auto_fill {
            return Strategy::Disabled;
        }
        match (settings.input_strategy, settings.focus_mode) {
            (InputStrategy::Privileged, FocusMode::Manual) => Strategy::PrivilegedKeystroke,
            _ => Strategy::AccessibilityAutoFill,
        }
    }

    /// Privileged input with auto focus: the focus agent has to be started
    /// with privilege before the broadcast can reach it.
    pub fn requires_agent_activation(settings: &Settings) -> bool {
        settings.auto_fill
            && settings.input_strategy == InputStrategy::Privileged
            && settings.focus_mode == FocusMode::Auto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(auto_fill: bool, strategy: InputStrategy, focus: FocusMode) -> Settings {
        Settings {
            auto_fill,
            input_strategy: strategy,
            focus_mode: focus,
            ..Settings::default()
        }
    }

    #[test]
    fn full_truth_table() {
        use FocusMode::*;
        use InputStrategy::*;

        let cases = [
            (false, Accessibility, Auto, Strategy::Disabled, false),
            (false, Accessibility, Manual, Strategy::Disabled, false),
            (false, Privileged, Auto, Strategy::Disabled, false),
            (false, Privileged, Manual, Strategy::Disabled, false),
            (true, Accessibility, Auto, Strategy::AccessibilityAutoFill, false),
            (true, Accessibility, Manual, Strategy::AccessibilityAutoFill, false),
            (true, Privileged, Auto, Strategy::AccessibilityAutoFill, true),
            (true, Privileged, Manual, Strategy::PrivilegedKeystroke, false),
        ];

        for (auto_fill, strategy, focus, expected, activation) in cases {
            let s = settings(auto_fill, strategy, focus);
            assert_eq!(
                ModeResolver::resolve(&s),
                expected,
                "auto_fill={auto_fill} strategy={strategy:?} focus={focus:?}"
            );
            assert_eq!(ModeResolver::requires_agent_activation(&s), activation);
        }
    }

    #[test]
    fn resolution_is_deterministic() {
        let s = settings(true, InputStrategy::Privileged, FocusMode::Manual);
        assert_eq!(ModeResolver::resolve(&s), ModeResolver::resolve(&s.clone()));
    }

    #[test]
    fn defaults_with_auto_fill_use_accessibility() {
        let s = Settings {
            auto_fill: true,
            ..Settings::default()
        };
        assert_eq!(ModeResolver::resolve(&s), Strategy::AccessibilityAutoFill);
    }
}
