use crate::commands::Command;
use crate::error::Result;
use crate::eval::CommandContext;

/// `set NAME [VALUE...]`: store a default variable. The value is the
/// remaining words joined by spaces; `NAME` may be given with or without `@`.
pub struct Set;

impl Command for Set {
    fn usage(&self) -> &str {
        "set NAME [VALUE...]"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let Some((name, value)) = ctx.args().split_first() else {
            return Err(ctx.fail(format!("usage: {}", self.usage())));
        };
        let key = ctx.variables().key_for(name);
        ctx.variables().set(key, value.join(" "));
        Ok(())
    }
}

/// `unset NAME`: remove a default variable. Unknown names are ignored.
pub struct Unset;

impl Command for Unset {
    fn usage(&self) -> &str {
        "unset NAME"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        for name in ctx.args() {
            let key = ctx.variables().key_for(name);
            ctx.variables().remove(&key);
        }
        Ok(())
    }
}

/// `vars`: every default variable as `KEY=VALUE`, sorted.
pub struct Vars;

impl Command for Vars {
    fn usage(&self) -> &str {
        "vars"
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        for (key, value) in ctx.variables().snapshot() {
            ctx.println(&format!("{key}={value}"));
        }
        Ok(())
    }
}

/// `alias [NAME [EXPANSION...]]`: define an alias, show one, or list all.
pub struct Alias;

impl Command for Alias {
    fn usage(&self) -> &str {
        "alias [NAME [EXPANSION...]]"
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        match ctx.args() {
            [] => {
                for (name, expansion) in ctx.aliases().snapshot() {
                    ctx.println(&format!("alias {name}='{expansion}'"));
                }
            }
            [name] => {
                let name = name.clone();
                let expansion = ctx
                    .aliases()
                    .get(&name)
                    .ok_or_else(|| ctx.fail(format!("{name}: not found")))?;
                ctx.println(&format!("alias {name}='{expansion}'"));
            }
            [name, rest @ ..] => {
                let (name, expansion) = (name.clone(), rest.join(" "));
                ctx.aliases().set(name, expansion);
            }
        }
        Ok(())
    }
}

/// `unalias NAME`: remove an alias.
pub struct Unalias;

impl Command for Unalias {
    fn usage(&self) -> &str {
        "unalias NAME"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn run(&self, ctx: &mut CommandContext<'_>) -> Result<()> {
        let name = ctx.args()[0].clone();
        if ctx.aliases().remove(&name).is_none() {
            return Err(ctx.fail(format!("{name}: not found")));
        }
        Ok(())
    }
}
