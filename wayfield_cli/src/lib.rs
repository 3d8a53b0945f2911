// wayfield_cli: command-line driver for the Wayfield nav library.
//
// The binary (`main.rs`) parses arguments with clap and installs logging;
// everything it does is in `commands.rs` so tests can call the same code
// without spawning a process.
//
// Module overview:
// - `commands.rs`: `build` (scene + volume -> mesh in a store), `path`
//                  (search a stored mesh), `inspect` (summarize a store).
//
// Dependencies: `wayfield_nav` for all navigation logic. This crate adds
// argument parsing and output formatting only.

pub mod commands;
