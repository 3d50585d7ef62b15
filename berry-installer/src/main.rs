fn main() -> anyhow::Result<()> {
    berry_installer::run()
}
