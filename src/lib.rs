//! Falling-block puzzle engine with a terminal front end.
//!
//! All game logic lives in [`game`]; the binary in `main.rs` adds the clock
//! thread, keyboard input, and ratatui rendering on top of it.

pub mod game;
