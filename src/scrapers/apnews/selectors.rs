//! CSS selectors for apnews.com markup.

pub const CONSENT_ACCEPT: &str = "#onetrust-accept-btn-handler";

pub const SEARCH_OPEN: &str = "button.SearchOverlay-search-button";
pub const SEARCH_INPUT: &str = "input.SearchOverlay-search-input";
pub const SEARCH_SUBMIT: &str = "button.SearchOverlay-search-submit";

pub const SORT_SELECT: &str = "div.SearchFilter-sortBy select";

pub const RESULTS_CONTAINER: &str = "div.SearchResultsModule-results";
pub const RESULT_CARDS: &str =
    "div.SearchResultsModule-results div.PageList-items div.PageList-items-item";

// Relative to a result card
pub const TITLE: &str = "div.PagePromo-content div.PagePromo-title span.PagePromoContentIcons-text";
pub const DESCRIPTION: &str =
    "div.PagePromo-content div.PagePromo-description span.PagePromoContentIcons-text";
pub const TIMESTAMP: &str = "div.PagePromo-content div.PagePromo-date bsp-timestamp";
pub const TIMESTAMP_ATTR: &str = "data-timestamp";
pub const MEDIA: &str = "div.PagePromo > div.PagePromo-media";
pub const IMAGE: &str = "img.Image";
pub const IMAGE_ATTR: &str = "src";
