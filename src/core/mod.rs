pub mod acquisition;
pub mod capture_writer;
pub mod colormap;
pub mod frame;
pub mod frame_queue;
pub mod frame_store;
pub mod handshake;
pub mod lifecycle;
pub mod plugin;
pub mod presenter;
pub mod radiometry;
pub mod raw_capture;
pub mod sensor;
pub mod station;
