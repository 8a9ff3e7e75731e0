fn main() -> anyhow::Result<()> {
    emotrust_lib::run()
}
