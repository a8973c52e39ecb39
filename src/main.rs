use anyhow::Result;
use geomtree::settings;
use geomtree::survey::Survey;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let settings = settings::load_config()?;
    let mut survey = Survey::new(settings)?;

    survey.solve()?;
    survey.writeup()
}
