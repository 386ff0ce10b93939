use gto_solver::cli;

fn main() {
    std::process::exit(cli::run());
}
