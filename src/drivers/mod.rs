pub mod apple_trackpad;
