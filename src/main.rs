#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

fn main() {
    std::process::exit(urgent_notifier::run());
}
