pub mod audio;

pub use audio::{ AudioCache, CacheError, SweepStats };
