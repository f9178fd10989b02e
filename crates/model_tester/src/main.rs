fn main() -> anyhow::Result<()> {
    lib_model_tester::init()
}
