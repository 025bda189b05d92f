/// Tokenize a pipeline stage into words using shlex (POSIX word splitting).
///
/// shlex rejects unterminated quotes; those inputs fall back to
/// [`tokenize_lenient`] so an open quote simply runs to the end of the line.
pub fn tokenize(command: &str) -> Vec<String> {
    shlex::split(command).unwrap_or_else(|| tokenize_lenient(command))
}

/// Word splitting that never fails: quotes are removed, a backslash outside
/// single quotes escapes the next character, and an unterminated quote
/// extends to the end of the input.
pub fn tokenize_lenient(command: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut buf = String::new();
    let mut in_word = false;
    let (mut sq, mut dq, mut esc) = (false, false, false);

    for c in command.chars() {
        if esc {
            buf.push(c);
            esc = false;
            continue;
        }
        if c == '\\' && !sq {
            esc = true;
            in_word = true;
            continue;
        }
        if c == '\'' && !dq {
            sq = !sq;
            in_word = true;
            continue;
        }
        if c == '"' && !sq {
            dq = !dq;
            in_word = true;
            continue;
        }
        if c.is_whitespace() && !sq && !dq {
            if in_word {
                words.push(std::mem::take(&mut buf));
                in_word = false;
            }
            continue;
        }
        buf.push(c);
        in_word = true;
    }
    if in_word {
        words.push(buf);
    }

    words
}

/// Quote words back into a single shell-safe command line.
pub fn join(words: &[String]) -> String {
    words
        .iter()
        .map(|w| {
            shlex::try_quote(w)
                .map(|q| q.into_owned())
                .unwrap_or_else(|_| w.clone())
        })
        .collect::<Vec<_>>()
        .join(" ")
}
