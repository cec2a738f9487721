fn main() -> std::process::ExitCode {
    lumen_examples::main()
}
