use anyhow::Result;
use ipopt_bridge::SolveStatus;

pub fn handle(code: i32) -> Result<()> {
    let status = SolveStatus::from_code(code);
    println!("code:        {code}");
    println!("status:      {status:?}");
    println!("outcome:     {:?}", status.outcome());
    println!("description: {}", status.description());
    Ok(())
}
