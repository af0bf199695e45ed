fn main() -> anyhow::Result<()> {
    motion_logger_lib::run()
}
