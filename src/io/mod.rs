mod fetcher;

pub use fetcher::{HttpImageFetcher, ImageFetcher, DEFAULT_CONNECT_TIMEOUT};
