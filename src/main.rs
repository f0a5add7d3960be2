fn main() {
    std::process::exit(taskring::app::startup::startup());
}
