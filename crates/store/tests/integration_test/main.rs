/// Integration tests for the statistics store covering bit-exact round trips,
/// partial accumulator persistence, and rejection of malformed archives.

mod corruption;
mod helpers;
mod partial_state;
mod round_trip;
