//! Textual reporting (spec §6): statistics as `key=value` lines, a
//! counterexample trace, and — behind the `dot` feature — a DOT dump of the
//! explored subsumption graph for `reach --dot`.

use std::io::{self, Write};

use crate::covreach::{CovReachResult, EdgeKind, Stats};
use crate::path::ConcreteStep;

/// `key=value`, one per line, the format a shell script or test harness can
/// `grep`/parse without a JSON dependency.
pub fn write_stats(w: &mut impl Write, stats: &Stats) -> io::Result<()> {
    writeln!(w, "visited={}", stats.visited)?;
    writeln!(w, "covered_on_push={}", stats.covered_on_push)?;
    writeln!(w, "covered_on_pop={}", stats.covered_on_pop)?;
    writeln!(w, "actual_edges={}", stats.actual_edges)?;
    writeln!(w, "subsumption_edges={}", stats.subsumption_edges)?;
    writeln!(w, "reached={}", stats.reached)?;
    writeln!(w, "running_time_seconds={:.6}", stats.elapsed.as_secs_f64())
}

/// A human-readable rendering of a counterexample: one line per step, the
/// vloc/intval the state carries and the concrete clock valuation sampled
/// from its zone.
pub fn write_trace(w: &mut impl Write, result: &CovReachResult, trace: &[ConcreteStep]) -> io::Result<()> {
    for (step_idx, step) in trace.iter().enumerate() {
        let node = &result.nodes[step.node_index];
        writeln!(
            w,
            "#{step_idx}: delay={} vloc={:?} intval={:?} clocks={:?}",
            step.delay,
            node.state.vloc.locations(),
            node.state.intval.values(),
            step.clock_valuation
        )?;
    }
    Ok(())
}

#[cfg(feature = "dot")]
pub fn write_dot(w: &mut impl Write, result: &CovReachResult) -> io::Result<()> {
    use dot_writer::{Attributes, Color, DotWriter, Style};

    let mut bytes = Vec::new();
    {
        let mut writer = DotWriter::from(&mut bytes);
        writer.set_pretty_print(true);
        let mut digraph = writer.digraph();
        for (idx, node) in result.nodes.iter().enumerate() {
            let label = format!("{:?}/{:?}", node.state.vloc.locations(), node.state.intval.values());
            let mut dot_node = digraph.node_named(format!("n{idx}"));
            dot_node.set_label(&label);
            if node.state.zone.is_empty() {
                dot_node.set_color(Color::Black);
            }
            if node.is_final {
                dot_node.set_color(Color::Red);
            }
        }
        for edge in &result.edges {
            let mut dot_edge = digraph.edge(format!("n{}", edge.src), format!("n{}", edge.tgt));
            if edge.kind == EdgeKind::Subsumption {
                dot_edge.attributes().set_style(Style::Dashed);
            }
        }
    }
    w.write_all(&bytes)
}

#[cfg(not(feature = "dot"))]
pub fn write_dot(_w: &mut impl Write, _result: &CovReachResult) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "built without the \"dot\" feature"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_output_has_one_key_per_line() {
        let stats = Stats { visited: 3, actual_edges: 2, reached: true, ..Default::default() };
        let mut buf = Vec::new();
        write_stats(&mut buf, &stats).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("visited=3"));
        assert!(text.contains("reached=true"));
        assert_eq!(text.lines().count(), 7);
    }
}
