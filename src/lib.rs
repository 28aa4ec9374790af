// Rental search aggregation: provider adapters, the composer that fans
// requests out to them, and the place token codec used by the UI layer

pub mod composer;
pub mod favorites;
pub mod flat_rent;
pub mod homy;
pub mod place_id_codec;
pub mod rent_abstraction;
pub mod search_form;
pub mod session;
pub mod supplier;

// Re-export key types for convenience
pub use composer::{ComposerConfig, RentProviderComposer};
pub use favorites::{Favorites, InMemoryStore, KeyValueStore, UserProfile};
pub use flat_rent::{FlatRentProvider, InMemoryFlatRentSdk, FLAT_RENT_PROVIDER_ID};
pub use homy::{HomyProvider, InMemoryHomySdk, HOMY_PROVIDER_ID};
pub use place_id_codec::{decode, encode, PlaceIdSource};
pub use rent_abstraction::{
    Location, RentError, RentProvider, RentProviderId, RentProviderPlaceId,
    RentProviderTransactionId, RentSearchInfo, RentSearchResult,
};
pub use search_form::{FormError, SearchFormDates, SearchFormInput};
pub use session::{SearchSession, SessionConfig, SessionError, SortOrder};
pub use supplier::SdkError;
