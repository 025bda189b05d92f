use std::time::Duration;

use replkit::error::{JobError, ParseError};
use replkit::jobs::JobStatus;
use replkit::parse::{self, find_unquoted_char, split_by_unquoted_char};
use replkit::{Engine, Error};

fn output_for(line: &str) -> String {
    match replkit::execute(line).into_result() {
        Ok(out) => out,
        Err(e) => panic!("line {line:?} failed: {e}"),
    }
}

fn error_for(line: &str) -> Error {
    let mut exec = replkit::execute(line);
    assert!(!exec.errors.is_empty(), "line {line:?} should fail");
    exec.errors.remove(0)
}

macro_rules! output_test {
    ($name:ident, $line:expr, $expected:expr) => {
        #[test]
        fn $name() {
            assert_eq!(output_for($line), $expected, "line: {}", $line);
        }
    };
}

macro_rules! error_test {
    ($name:ident, $line:expr, $pattern:pat) => {
        #[test]
        fn $name() {
            let err = error_for($line);
            assert!(matches!(err, $pattern), "line: {}, error: {err:?}", $line);
        }
    };
}

// ── Plain commands ──

output_test!(print_words, "print hello world", "hello world\n");
output_test!(echo_is_print, "echo hi", "hi\n");
output_test!(print_quoted_pipe, "print 'a | b'", "a | b\n");
output_test!(print_quoted_semicolon, "print \"x; y\"", "x; y\n");
output_test!(print_escaped_quote, r#"print "say \"hi\"""#, "say \"hi\"\n");
output_test!(unterminated_quote_is_lenient, "print 'open ended", "open ended\n");
output_test!(blank_line, "   ", "");
output_test!(comment_only, "# nothing here", "");

// ── Pipelines ──

output_test!(pipe_upper, "print abc | upper", "ABC\n");
output_test!(pipe_wc, "print one two | wc", "1 2 8\n");
output_test!(pipe_three_stages, "print apple | grep app | upper", "APPLE\n");
output_test!(pipe_grep_drops, "print pear | grep app | upper", "");
output_test!(pipe_grep_invert, "print pear | grep -v app", "pear\n");

// ── Command groups ──

output_test!(groups_in_order, "print a; print b; print c", "a\nb\nc\n");
output_test!(empty_groups_skipped, "print a;; ;print b", "a\nb\n");
// the whole line is substituted before any group runs
output_test!(substitution_precedes_execution, "set who world; print hi @who", "hi @who\n");

// ── Continuations ──

output_test!(continuation_joins, "print a \\\nb", "a b\n");
output_test!(comment_then_command, "# note\nprint hi", "hi\n");

// ── Substitution ──

output_test!(exec_token, "print \"@exec:print inner\" outer", "inner outer\n");
output_test!(exec_token_nested_pipe, "print \"@exec:print abc | upper\"", "ABC\n");
output_test!(exec_failure_swallowed, "print a \"@exec:nope\" b", "a  b\n");
output_test!(unknown_token_literal, "print @nobody", "@nobody\n");
output_test!(token_inside_word_untouched, "print x@who", "x@who\n");

// ── Errors ──

error_test!(unknown_command, "frobnicate", Error::UnknownCommand(_));
error_test!(usage_error, "grep", Error::Usage { .. });
error_test!(dangling_pipe, "print a |", Error::Parse(ParseError::InvalidSyntax(_)));
error_test!(leading_pipe, "| print a", Error::Parse(ParseError::InvalidSyntax(_)));
error_test!(double_redirect, "print a > f1 > f2", Error::Parse(ParseError::MultipleRedirects));
error_test!(append_redirect_rejected, "print a >> f1", Error::Parse(ParseError::MultipleRedirects));
error_test!(missing_redirect_target, "print a >", Error::Parse(ParseError::MissingRedirectTarget));
error_test!(bad_sleep, "sleep soon", Error::Command { .. });
error_test!(unknown_job, "wait 42", Error::Job(JobError::NotFound(42)));

// ── Failure isolation ──

#[test]
fn bad_group_does_not_stop_later_groups() {
    let exec = replkit::execute("bad_cmd ; print ok");
    assert!(matches!(exec.error(), Some(Error::UnknownCommand(name)) if name == "bad_cmd"));
    assert_eq!(exec.output, "ok\n");
}

#[test]
fn every_failure_is_reported() {
    let exec = replkit::execute("nope1; print between; nope2");
    assert_eq!(exec.errors.len(), 2);
    assert_eq!(exec.output, "between\n");
}

#[test]
fn failing_stage_discards_its_chain() {
    let exec = replkit::execute("print a | grep | upper; print b");
    assert!(matches!(exec.error(), Some(Error::Usage { .. })));
    assert_eq!(exec.output, "b\n");
}

// ── Parser properties ──

#[test]
fn unquoted_split_matches_plain_split() {
    for input in ["a;b;c", "a;;b", ";lead", "trail;", "x", "no separators here"] {
        let plain: Vec<String> = input.split(';').map(str::to_string).collect();
        assert_eq!(split_by_unquoted_char(input, ';'), plain, "input: {input}");
    }
}

#[test]
fn find_skips_quoted_occurrences() {
    assert_eq!(find_unquoted_char("print '>' > out", '>'), Some(10));
    assert_eq!(find_unquoted_char("print \"a>b\"", '>'), None);
    assert_eq!(find_unquoted_char(r"print \> x", '>'), None);
}

#[test]
fn pipeline_shape() {
    let parsed = parse::parse("cmd a b | cmd2 c").unwrap();
    assert_eq!(parsed.groups.len(), 1);
    let stages: Vec<(&str, Vec<&str>)> = parsed.groups[0]
        .iter()
        .map(|s| (s.name.as_str(), s.args.iter().map(String::as_str).collect()))
        .collect();
    assert_eq!(stages, vec![("cmd", vec!["a", "b"]), ("cmd2", vec!["c"])]);
}

#[test]
fn redirect_is_unique_per_input() {
    assert_eq!(
        parse::parse("echo a > f1\necho b > f2").unwrap_err(),
        ParseError::MultipleRedirects
    );
    let parsed = parse::parse("echo a > out.txt").unwrap();
    assert_eq!(parsed.redirect.as_deref(), Some("out.txt"));
    assert_eq!(parsed.groups.len(), 1);
}

#[test]
fn comment_and_continuation() {
    let parsed = parse::parse("# note\nprint hi").unwrap();
    assert_eq!(parsed.groups.len(), 1);
    assert_eq!(parsed.groups[0].name, "print");
    assert_eq!(parsed.groups[0].args, vec!["hi"]);

    let parsed = parse::parse("print a \\\nb").unwrap();
    assert_eq!(parsed.groups.len(), 1);
    assert_eq!(parsed.groups[0].len(), 1);
    assert_eq!(parsed.groups[0].args, vec!["a", "b"]);
}

mod prop {
    use super::*;
    use proptest::prelude::*;
    use proptest::prelude::prop;

    proptest! {
        #[test]
        fn expansion_is_idempotent_without_tokens(line in "[a-z0-9 ;|>'\"]{0,40}") {
            let engine = Engine::default();
            engine.variables().set("@unused", "value");
            let once = engine.expand(&line);
            prop_assert_eq!(engine.expand(&once), once);
        }

        #[test]
        fn failed_nested_exec_yields_empty_word(
            before in "[a-z]{1,8}",
            missing in "[a-z]{1,8}",
            after in "[a-z]{1,8}",
        ) {
            // the zz prefix keeps the nested command unregistered
            let line = format!("print {before} \"@exec:zz{missing}\" {after}");
            let exec = replkit::execute(&line);
            prop_assert!(exec.is_ok());
            prop_assert_eq!(exec.output, format!("{before}  {after}\n"));
        }

        #[test]
        fn groups_split_like_plain_text(words in prop::collection::vec("[a-z]{1,6}", 1..6)) {
            let line = words
                .iter()
                .map(|w| format!("print {w}"))
                .collect::<Vec<_>>()
                .join("; ");
            let expected: String = words.iter().map(|w| format!("{w}\n")).collect();
            prop_assert_eq!(replkit::execute(&line).into_result().unwrap(), expected);
        }
    }
}

// ── Redirect ──

#[test]
fn redirect_writes_combined_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let line = format!("print one; print two | upper > {}", path.display());
    assert_eq!(output_for(&line), "one\nTWO\n");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\nTWO\n");
}

#[test]
fn redirect_target_takes_variables() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Engine::default();
    engine.variables().set("@dir", dir.path().display().to_string());
    engine.execute("print saved > @dir/x.txt").into_result().unwrap();
    assert_eq!(
        std::fs::read_to_string(dir.path().join("x.txt")).unwrap(),
        "saved\n"
    );
}

#[test]
fn caller_input_flows_into_pipeline() {
    let engine = Engine::default();
    let out = engine
        .execute_with_input("grep b | upper", "abc\nxyz\nbob\n")
        .into_result()
        .unwrap();
    assert_eq!(out, "ABC\nBOB\n");
    let out = engine.execute_with_input("print", "kept\n").into_result().unwrap();
    assert_eq!(out, "kept\n");
}

// ── Shared state ──

#[test]
fn clones_share_state() {
    let engine = Engine::default();
    let other = engine.clone();
    engine.execute("set shared 1; alias hey print hey").into_result().unwrap();
    assert_eq!(other.execute("print @shared").into_result().unwrap(), "1\n");
    assert_eq!(other.execute("hey").into_result().unwrap(), "hey\n");
}

#[test]
fn concurrent_sessions() {
    let engine = Engine::default();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            std::thread::spawn(move || {
                engine.execute(&format!("set v{i} {i}")).into_result().unwrap();
                engine
                    .execute(&format!("print \"@exec:print @v{i}\""))
                    .into_result()
                    .unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("{i}\n"));
    }
    assert_eq!(engine.variables().len(), 8);
}

#[test]
fn help_lists_builtins() {
    let out = output_for("help");
    for name in ["print", "grep", "bg", "jobs", "run", "set"] {
        assert!(out.lines().any(|l| l.starts_with(name)), "missing {name}");
    }
}

// ── Job lifecycle ──

#[cfg(unix)]
mod jobs {
    use super::*;

    #[test]
    fn sequential_ids_from_one() {
        let engine = Engine::default();
        assert_eq!(engine.spawn("true").unwrap(), 1);
        assert_eq!(engine.spawn("true").unwrap(), 2);
        assert_eq!(engine.spawn("true").unwrap(), 3);
    }

    #[test]
    fn completed_after_wait() {
        let engine = Engine::default();
        let id = engine.spawn("sh -c 'echo out; echo err >&2'").unwrap();
        engine.jobs().wait(id).unwrap();
        let job = engine.jobs().get(id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.exit_code, Some(0));
        assert!(job.end_time.is_some());
        assert!(job.output.contains("out\n"));
        assert!(job.output.contains("err\n"));
    }

    #[test]
    fn kill_is_idempotent() {
        let engine = Engine::default();
        let id = engine.spawn("sleep 30").unwrap();
        engine.jobs().kill(id).unwrap();
        engine.jobs().kill(id).unwrap();
        assert_eq!(engine.jobs().get(id).unwrap().status, JobStatus::Killed);
    }

    #[test]
    fn clean_removes_only_terminal_jobs() {
        let engine = Engine::default();
        let done = engine.spawn("true").unwrap();
        let failed = engine.spawn("false").unwrap();
        let running = engine.spawn("sleep 30").unwrap();
        engine.jobs().wait(done).unwrap();
        assert!(engine.jobs().wait(failed).is_err());

        assert_eq!(engine.jobs().clean(), 2);
        let remaining: Vec<_> = engine.jobs().list().into_iter().map(|j| j.id).collect();
        assert_eq!(remaining, vec![running]);

        engine.jobs().kill(running).unwrap();
        assert_eq!(engine.jobs().clean(), 1);
        assert!(engine.jobs().is_empty());
    }

    #[test]
    fn wait_timeout_on_running_job() {
        let engine = Engine::default();
        let id = engine.spawn("sleep 30").unwrap();
        let status = engine
            .jobs()
            .wait_timeout(id, Duration::from_millis(50))
            .unwrap();
        assert_eq!(status, JobStatus::Running);
        engine.jobs().kill(id).unwrap();
    }

    #[test]
    fn spawn_missing_program() {
        let engine = Engine::default();
        assert!(matches!(
            engine.spawn("replkit-no-such-program"),
            Err(Error::Io(_))
        ));
        assert!(engine.jobs().is_empty());
    }

    #[test]
    fn builtin_job_commands() {
        let engine = Engine::default();
        assert_eq!(engine.execute("bg echo hi").into_result().unwrap(), "[1]\n");
        assert_eq!(engine.execute("wait %1").into_result().unwrap(), "hi\n");
        let listing = engine.execute("jobs").into_result().unwrap();
        assert!(listing.starts_with("[1] completed"));
        assert!(listing.trim_end().ends_with("echo hi"));
    }
}

// ── Timeout ──

#[test]
fn execute_timeout_bounds_call() {
    let engine = Engine::default();
    let exec = engine.execute_timeout("sleep 1", Duration::from_millis(20));
    assert!(matches!(exec.error(), Some(Error::Timeout(_))));

    let exec = engine.execute_timeout("print quick", Duration::from_secs(5));
    assert_eq!(exec.into_result().unwrap(), "quick\n");
}
