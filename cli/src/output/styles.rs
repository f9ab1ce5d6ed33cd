//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;

use crate::domain::InfrastructureState;

/// Centralized stylesheet for CLI output colors. Plain by default.
#[derive(Default, Clone)]
pub struct Styles {
    pub success: Style,
    pub warning: Style,
    pub error: Style,
    pub info: Style,
    /// In-progress steps
    pub step: Style,
    /// Secondary text, including streamed tool output
    pub dim: Style,
    pub header: Style,
}

impl Styles {
    /// Colored stylesheet when `enabled`, plain otherwise.
    #[must_use]
    pub fn for_terminal(enabled: bool) -> Self {
        let mut styles = Self::default();
        if enabled {
            styles.success = Style::new().green();
            styles.warning = Style::new().yellow();
            styles.error = Style::new().red().bold();
            styles.info = Style::new().blue();
            styles.step = Style::new().cyan();
            styles.dim = Style::new().dimmed();
            styles.header = Style::new().bold().cyan();
        }
        styles
    }

    /// Style for an instance state in `status` output.
    #[must_use]
    pub fn state(&self, state: InfrastructureState) -> Style {
        match state {
            InfrastructureState::Running => self.success,
            InfrastructureState::Stopped => self.warning,
            InfrastructureState::Creating | InfrastructureState::Removing => self.step,
            InfrastructureState::NotCreated => self.dim,
        }
    }
}
