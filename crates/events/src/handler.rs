/// Decide and evolve in one step, without persistence.
///
/// Used by aggregate unit tests and by workflows that dry-run a transition
/// before touching another stream. Production writes go through
/// `CommandDispatcher::dispatch`.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: templeerp_core::Aggregate,
{
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}
