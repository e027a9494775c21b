use crate::driver::Value;
use crate::error::{DbError, DbResult};
use chrono::{DateTime, Utc};
use std::fmt;

/// Database parameter syntax selected by a placeholder verb.
///
/// | Database               | Verb | Placeholder |
/// |------------------------|------|-------------|
/// | MySQL, MariaDB, SQLite | `%?` | `?`         |
/// | PostgreSQL             | `%$` | `$N`        |
/// | Microsoft SQL Server   | `%@` | `@pN`       |
/// | Oracle Database        | `%:` | `:N`        |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Question,
    Dollar,
    At,
    Colon,
}

impl Placeholder {
    fn from_verb(verb: char) -> Option<Self> {
        match verb {
            '?' => Some(Self::Question),
            '$' => Some(Self::Dollar),
            '@' => Some(Self::At),
            ':' => Some(Self::Colon),
            _ => None,
        }
    }

    /// Whether `N` advances for this style.
    fn is_numbered(self) -> bool {
        !matches!(self, Self::Question)
    }

    fn write(self, out: &mut String, n: usize) {
        match self {
            Self::Question => out.push('?'),
            Self::Dollar => out.push_str(&format!("${n}")),
            Self::At => out.push_str(&format!("@p{n}")),
            Self::Colon => out.push_str(&format!(":{n}")),
        }
    }
}

/// A builder argument: a single value, or a list for the `+` flag.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    List(Vec<Value>),
}

impl Arg {
    /// A list argument, expanded by `%+?` and friends.
    pub fn list<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Arg::List(values.into_iter().map(Into::into).collect())
    }

    fn describe(&self) -> &'static str {
        match self {
            Arg::Value(value) => value.kind(),
            Arg::List(_) => "list",
        }
    }
}

macro_rules! impl_from_for_arg {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Arg {
                fn from(value: $t) -> Self {
                    Arg::Value(value.into())
                }
            }
        )*
    };
}

impl_from_for_arg!(
    i8, i16, i32, i64, u8, u16, u32, f32, f64, bool, &str, String, &String, Vec<u8>, &[u8],
    DateTime<Utc>,
);

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        Arg::Value(value.into())
    }
}

/// A raw SQL query builder.
///
/// `appendf` works like a tiny `printf`: `%s`/`%v` write an argument as-is,
/// `%d` writes an integer, `%%` writes a percent sign, and the placeholder
/// verbs (see [`Placeholder`]) write a database placeholder and record the
/// argument. With the `+` flag a placeholder verb expands a list argument
/// into comma-separated placeholders, e.g. `%+$` with `[1, 2, 3]` writes
/// `$1, $2, $3`, which is handy for `WHERE IN (...)` clauses.
///
/// The raw verbs accept a width and the `-` (left-align) and `0` (zero-pad,
/// `%d` only) flags, as in `%-10s` or `%05d`. Placeholder verbs reject them.
///
/// Always pass user input through placeholder verbs to avoid SQL injection.
///
/// # Example
///
/// ```ignore
/// use queries::{Arg, Builder};
///
/// let mut qb = Builder::new();
/// qb.appendf("SELECT %s FROM users WHERE 1=1", ["id, name".into()])?;
/// qb.appendf(" AND id IN (%+$)", [Arg::list([1, 2, 3])])?;
/// let (query, args) = qb.build();
/// assert_eq!(query, "SELECT id, name FROM users WHERE 1=1 AND id IN ($1, $2, $3)");
/// ```
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Builder {
    query: String,
    debug: String,
    args: Vec<Value>,
    counter: usize,
    placeholder: Option<Placeholder>,
}

/// Append state for one `appendf` call; committed only on success.
struct Pending {
    query: String,
    debug: String,
    args: Vec<Value>,
    counter: usize,
    placeholder: Option<Placeholder>,
}

impl Pending {
    fn push_str(&mut self, s: &str) {
        self.query.push_str(s);
        self.debug.push_str(s);
    }

    fn push_char(&mut self, c: char) {
        self.query.push(c);
        self.debug.push(c);
    }

    fn bind(&mut self, placeholder: Placeholder, value: Value) -> DbResult<()> {
        match self.placeholder {
            None => self.placeholder = Some(placeholder),
            Some(used) if used != placeholder => {
                return Err(DbError::bad_query("different placeholders used"));
            }
            Some(_) => {}
        }
        if placeholder.is_numbered() {
            self.counter += 1;
        }
        placeholder.write(&mut self.query, self.counter);
        self.debug.push_str(&value.to_sql_literal());
        self.args.push(value);
        Ok(())
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format `format` with `args` and append the result.
    ///
    /// On error (unknown verb, missing or extra arguments, mixed placeholder
    /// styles, a bad list argument) nothing is appended.
    pub fn appendf<I>(&mut self, format: &str, args: I) -> DbResult<&mut Self>
    where
        I: IntoIterator<Item = Arg>,
    {
        let mut out = Pending {
            query: String::with_capacity(format.len()),
            debug: String::with_capacity(format.len()),
            args: Vec::new(),
            counter: self.counter,
            placeholder: self.placeholder,
        };
        let mut args = args.into_iter();
        let mut used = 0usize;
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                out.push_char(c);
                continue;
            }

            let mut flags = String::new();
            while let Some(flag) = chars.next_if(|c| matches!(c, '+' | '-' | '0')) {
                flags.push(flag);
            }
            let plus = flags.contains('+');
            let mut pad = Pad {
                left: flags.contains('-'),
                zero: flags.contains('0'),
                width: 0,
            };
            while let Some(digit) = chars.next_if(char::is_ascii_digit) {
                flags.push(digit);
                let digit = digit.to_digit(10).map_or(0, |d| d as usize);
                pad.width = pad.width.saturating_mul(10).saturating_add(digit);
            }
            let verb = chars
                .next()
                .ok_or_else(|| DbError::bad_query(format!("incomplete verb at end of {format:?}")))?;
            if verb == '%' && flags.is_empty() {
                out.push_char('%');
                continue;
            }
            if pad.is_set() && !matches!(verb, 's' | 'v' | 'd') {
                return Err(DbError::bad_query(format!(
                    "width and the - and 0 flags are only valid with %s, %v and %d, got %{flags}{verb}"
                )));
            }

            let arg = args.next().ok_or_else(|| {
                DbError::bad_query(format!("missing argument for %{verb} in {format:?}"))
            })?;
            used += 1;

            match (Placeholder::from_verb(verb), arg) {
                (Some(placeholder), Arg::List(values)) if plus => {
                    if values.is_empty() {
                        return Err(DbError::bad_query(format!(
                            "zero-length list argument for %+{verb}"
                        )));
                    }
                    for (i, value) in values.into_iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        out.bind(placeholder, value)?;
                    }
                }
                (Some(_), arg) if plus => {
                    return Err(DbError::bad_query(format!(
                        "%+{verb} expects a list argument, got {}",
                        arg.describe()
                    )));
                }
                (Some(_), Arg::List(_)) => {
                    return Err(DbError::bad_query(format!(
                        "list argument for %{verb} requires the + flag"
                    )));
                }
                (Some(placeholder), Arg::Value(value)) => out.bind(placeholder, value)?,
                (None, _) if plus => {
                    return Err(DbError::bad_query(format!(
                        "the + flag is only valid with placeholder verbs, got %{flags}{verb}"
                    )));
                }
                (None, arg) => match verb {
                    's' | 'v' => out.push_str(&pad.apply(raw_text(&arg), false)),
                    'd' => match arg {
                        Arg::Value(Value::Int(n)) => out.push_str(&pad.apply(n.to_string(), true)),
                        other => {
                            return Err(DbError::bad_query(format!(
                                "%d expects an integer argument, got {}",
                                other.describe()
                            )));
                        }
                    },
                    _ => {
                        return Err(DbError::bad_query(format!("unknown verb %{verb}")));
                    }
                },
            }
        }

        let extra = args.count();
        if extra > 0 {
            return Err(DbError::bad_query(format!(
                "{extra} extra argument(s) for {format:?} (used {used})"
            )));
        }

        self.query.push_str(&out.query);
        self.debug.push_str(&out.debug);
        self.args.extend(out.args);
        self.counter = out.counter;
        self.placeholder = out.placeholder;
        Ok(self)
    }

    /// The query built so far.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// The arguments recorded so far, in placeholder order.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The placeholder style in use, once a placeholder verb was seen.
    pub fn placeholder(&self) -> Option<Placeholder> {
        self.placeholder
    }

    /// Consume the builder, returning the query and its arguments.
    pub fn build(self) -> (String, Vec<Value>) {
        (self.query, self.args)
    }

    /// The query with every placeholder replaced by its argument as a SQL
    /// literal.
    ///
    /// For logging only: never execute the result.
    pub fn debug_string(&self) -> &str {
        &self.debug
    }
}

impl fmt::Display for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

/// Width and alignment of a raw verb, e.g. `%-10s` or `%05d`.
struct Pad {
    left: bool,
    zero: bool,
    width: usize,
}

impl Pad {
    fn is_set(&self) -> bool {
        self.left || self.zero || self.width > 0
    }

    fn apply(&self, text: String, numeric: bool) -> String {
        let len = text.chars().count();
        if len >= self.width {
            return text;
        }
        let fill = self.width - len;
        if self.left {
            return text + &" ".repeat(fill);
        }
        if self.zero && numeric {
            // Zeros go after the sign.
            return match text.strip_prefix('-') {
                Some(digits) => format!("-{}{digits}", "0".repeat(fill)),
                None => "0".repeat(fill) + &text,
            };
        }
        " ".repeat(fill) + &text
    }
}

fn raw_text(arg: &Arg) -> String {
    match arg {
        Arg::Value(value) => value.to_string(),
        Arg::List(values) => values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Shorthand for [`Builder::new`] + [`Builder::appendf`] + [`Builder::build`].
pub fn build<I>(format: &str, args: I) -> DbResult<(String, Vec<Value>)>
where
    I: IntoIterator<Item = Arg>,
{
    let mut builder = Builder::new();
    builder.appendf(format, args)?;
    Ok(builder.build())
}

/// Call [`Builder::appendf`] with arguments converted via `Arg::from`.
///
/// ```ignore
/// appendf!(qb, " AND id = %$ AND name = %$", id, name)?;
/// appendf!(qb, " AND tag IN (%+$)", Arg::list(tags))?;
/// ```
#[macro_export]
macro_rules! appendf {
    ($builder:expr, $format:expr $(, $arg:expr)* $(,)?) => {{
        let args: ::std::vec::Vec<$crate::Arg> = ::std::vec![$($crate::Arg::from($arg)),*];
        $builder.appendf($format, args)
    }};
}

/// Call [`build`](crate::build) with arguments converted via `Arg::from`.
#[macro_export]
macro_rules! build {
    ($format:expr $(, $arg:expr)* $(,)?) => {{
        let args: ::std::vec::Vec<$crate::Arg> = ::std::vec![$($crate::Arg::from($arg)),*];
        $crate::build($format, args)
    }};
}
