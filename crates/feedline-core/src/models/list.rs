use std::time::Duration;

use crate::models::{CoreError, CoreErrorKind};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_LOADING_INDICATOR_DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum ListPhase {
    #[default]
    Idle,
    LoadingNext,
    Refreshing,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ListOperation {
    InitialLoad,
    LoadNext,
    Refresh,
    Refetch,
}

impl ListOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InitialLoad => "initial_load",
            Self::LoadNext => "load_next",
            Self::Refresh => "refresh",
            Self::Refetch => "refetch",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ListConfig {
    pub page_size: usize,
    pub loading_indicator_debounce: Duration,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            loading_indicator_debounce: DEFAULT_LOADING_INDICATOR_DEBOUNCE,
        }
    }
}

impl ListConfig {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.page_size == 0 {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                "page size must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Read-only view of a list controller. Rendering code consumes this and
/// never mutates controller state directly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListSnapshot<N> {
    pub items: Vec<N>,
    pub has_next: bool,
    pub phase: ListPhase,
    pub last_error: Option<CoreError>,
}

impl<N> ListSnapshot<N> {
    pub fn is_loading_next(&self) -> bool {
        self.phase == ListPhase::LoadingNext
    }

    pub fn is_refreshing(&self) -> bool {
        self.phase == ListPhase::Refreshing
    }

    pub fn is_idle(&self) -> bool {
        self.phase == ListPhase::Idle
    }

    /// Raw value behind the footer spinner, before debouncing.
    pub fn wants_loading_indicator(&self) -> bool {
        self.is_loading_next() && !self.is_refreshing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(phase: ListPhase) -> ListSnapshot<u32> {
        ListSnapshot {
            items: Vec::new(),
            has_next: true,
            phase,
            last_error: None,
        }
    }

    #[test]
    fn loading_indicator_is_only_wanted_while_loading_next() {
        assert!(snapshot(ListPhase::LoadingNext).wants_loading_indicator());
        assert!(!snapshot(ListPhase::Refreshing).wants_loading_indicator());
        assert!(!snapshot(ListPhase::Idle).wants_loading_indicator());
    }

    #[test]
    fn default_config_matches_list_screen_defaults() {
        let config = ListConfig::default();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.loading_indicator_debounce, Duration::from_millis(150));
        assert!(config.validate().is_ok());
        assert!(ListConfig::with_page_size(0).validate().is_err());
    }
}
