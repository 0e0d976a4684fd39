use hookline_core::version::version_string;
use hookline_core::VERSION;
use miette::Result;

pub fn run(json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "version": VERSION
            })
        );
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
