mod actions;
mod cli;

fn main() {
    std::process::exit(cli::dispatch::run());
}
