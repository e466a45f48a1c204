//! View state management

use crate::types::{PageNumber, RenderParams};

/// What the viewer is currently showing and at which size
#[derive(Clone, Debug)]
pub struct ViewState {
    /// Container width in pixels
    pub width_px: u32,

    /// Render scale factor
    pub scale: f32,

    /// Current page (1-indexed)
    pub current_page: PageNumber,

    /// Total page count
    pub page_count: usize,
}

impl ViewState {
    /// Minimum allowed scale
    pub const MIN_SCALE: f32 = 0.1;

    #[must_use]
    pub fn new(params: RenderParams, page_count: usize) -> Self {
        Self {
            width_px: params.width_px,
            scale: params.scale.max(Self::MIN_SCALE),
            current_page: 1,
            page_count,
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::Reload => {
                vec![Effect::ReloadDocument, Effect::RenderCurrentPage]
            }

            Command::SetWidth(width_px) => {
                if width_px > 0 && self.width_px != width_px {
                    self.width_px = width_px;
                    vec![Effect::InvalidateCache, Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::SetScale(scale) => {
                let clamped = scale.max(Self::MIN_SCALE);
                if (self.scale - clamped).abs() > f32::EPSILON {
                    self.scale = clamped;
                    vec![Effect::InvalidateCache, Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::GoToPage(page) => {
                let clamped = self.clamp(page);
                if self.current_page != clamped {
                    self.current_page = clamped;
                    vec![Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::NextPage => self.apply(Command::GoToPage(self.current_page + 1)),

            Command::PrevPage => {
                self.apply(Command::GoToPage(self.current_page.saturating_sub(1)))
            }

            Command::SetPageCount(count) => {
                self.page_count = count;
                self.current_page = self.clamp(self.current_page);
                vec![]
            }

            Command::Clear => {
                vec![Effect::InvalidateCache]
            }
        }
    }

    fn clamp(&self, page: PageNumber) -> PageNumber {
        page.clamp(1, self.page_count.max(1))
    }

    /// Render parameters for the current state
    #[must_use]
    pub fn render_params(&self) -> RenderParams {
        RenderParams::new(self.width_px, self.scale)
    }
}

/// Commands that modify view state
#[derive(Clone, Debug)]
pub enum Command {
    /// Re-acquire the document
    Reload,
    /// New container width measurement
    SetWidth(u32),
    /// Set the scale factor
    SetScale(f32),
    /// Go to a specific page
    GoToPage(PageNumber),
    NextPage,
    PrevPage,
    /// Update the page count
    SetPageCount(usize),
    /// Drop all cached pages
    Clear,
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Start a new epoch with the current render params
    InvalidateCache,
    /// Display the current page
    RenderCurrentPage,
    /// Resolve and open the document again
    ReloadDocument,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> ViewState {
        ViewState::new(RenderParams::new(800, 0.9), 20)
    }

    #[test]
    fn set_width_no_change_returns_empty() {
        let mut state = test_state();
        assert!(state.apply(Command::SetWidth(800)).is_empty());
        assert!(state.apply(Command::SetWidth(0)).is_empty());
    }

    #[test]
    fn set_width_with_change_returns_invalidate_and_render() {
        let mut state = test_state();

        let effects = state.apply(Command::SetWidth(1024));
        assert_eq!(state.width_px, 1024);
        assert_eq!(
            effects,
            vec![Effect::InvalidateCache, Effect::RenderCurrentPage]
        );
    }

    #[test]
    fn set_scale_clamps() {
        let mut state = test_state();
        let effects = state.apply(Command::SetScale(0.0));
        assert!((state.scale - ViewState::MIN_SCALE).abs() < f32::EPSILON);
        assert_eq!(
            effects,
            vec![Effect::InvalidateCache, Effect::RenderCurrentPage]
        );
        assert!(state.apply(Command::SetScale(0.05)).is_empty());
    }

    #[test]
    fn go_to_page_renders() {
        let mut state = test_state();

        let effects = state.apply(Command::GoToPage(5));
        assert_eq!(state.current_page, 5);
        assert_eq!(effects, vec![Effect::RenderCurrentPage]);
    }

    #[test]
    fn go_to_page_clamps_to_range() {
        let mut state = test_state();

        state.apply(Command::GoToPage(999));
        assert_eq!(state.current_page, 20);
        state.apply(Command::GoToPage(0));
        assert_eq!(state.current_page, 1);
    }

    #[test]
    fn flipping_stops_at_edges() {
        let mut state = test_state();
        assert!(state.apply(Command::PrevPage).is_empty());
        assert_eq!(state.current_page, 1);

        state.apply(Command::GoToPage(20));
        assert!(state.apply(Command::NextPage).is_empty());
        assert_eq!(state.apply(Command::PrevPage), vec![Effect::RenderCurrentPage]);
        assert_eq!(state.current_page, 19);
    }

    #[test]
    fn shrinking_page_count_clamps_current_page() {
        let mut state = test_state();
        state.apply(Command::GoToPage(15));
        assert!(state.apply(Command::SetPageCount(10)).is_empty());
        assert_eq!(state.current_page, 10);
    }

    #[test]
    fn reload_reloads_and_renders() {
        let mut state = test_state();
        assert_eq!(
            state.apply(Command::Reload),
            vec![Effect::ReloadDocument, Effect::RenderCurrentPage]
        );
    }
}
