#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// an identifier, a variable name, keyword or filter name
    Id,
    /// a literal integer
    Int,
    /// a literal decimal number
    Float,
    /// a literal string, in double or single quotes
    String,
    /// a dot `.` to look up a property by name
    Dot,
    /// an opening bracket `[` to look up a property by index or string
    BracketOpen,
    /// a closing bracket `]`
    BracketClose,
    /// a pipe `|` to indicate a filter
    Pipe,
    /// a colon `:` to start the arguments of a filter
    Colon,
    /// a comma `,` to separate filter arguments
    Comma,
    /// a comparison operator, one of `== != <> <= >= < >`
    Comparator,
    /// any whitespace
    Whitespace,
    /// special token to indicate the end of the input
    Eof,
    /// special token to indicate unknown token
    Unknown,
}

mod statics {
    use super::Token;
    use regex::{Regex, RegexSet};
    use std::sync::LazyLock;

    macro_rules! make_regex_set {
        {$vis: vis ($tokens: ident, $re_set: ident, $re_compiled: ident) = {$($tk: ident <- $pat: literal)*};} => {
            $vis static $tokens: &[Token] = &[
                $(Token::$tk, )*
            ];

            $vis static $re_set: LazyLock<RegexSet> = LazyLock::new(|| RegexSet::new([
                $(
                    concat!("^", $pat),
                )*
                ]).expect("error building RegexSet"));

            $vis static $re_compiled: LazyLock<Vec<Regex>> = LazyLock::new(|| vec![
                $(
                    Regex::new(concat!("^", $pat)).expect(concat!("Error building Regex `", $pat, "`")),
                )*
            ]);
        };
    }

    make_regex_set! {
        pub(super) (TOKENS, REGEX_SET, REGEX_LIST) = {
            Id <- "[a-zA-Z_][a-zA-Z0-9_-]*\\??"
            Int <- "-?[0-9]+"
            // digits are required on both sides so `list.0.name` stays a path
            Float <- r"-?[0-9]+\.[0-9]+"
            String <- r#""(\\.|[^\\"])*"|'(\\.|[^\\'])*'"#
            Dot <- r"\."
            BracketOpen <- r"\["
            BracketClose <- r"\]"
            Pipe <- r"\|"
            Colon <- ":"
            Comma <- ","
            Comparator <- "==|!=|<>|<=|>=|<|>"
            Whitespace <- r"\p{White_Space}+"
        };
    }
}

#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    slice: &'a str,
    idx: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lexeme<'a> {
    pub token: Token,
    pub value: &'a str,
}

const EOF: Lexeme = Lexeme {
    token: Token::Eof,
    value: "",
};

impl<'a> Scanner<'a> {
    #[must_use]
    pub const fn new(slice: &'a str) -> Self {
        Self { slice, idx: 0 }
    }

    #[must_use]
    pub fn peek_token(&self) -> Lexeme<'a> {
        let rest = &self.slice[self.idx..];
        let Some(first) = rest.chars().next() else {
            return EOF;
        };

        // note: we can't use find_at because it still considers the start of
        // the string (e.g., for `^`) to be i = 0, not i = idx.
        statics::REGEX_SET
            .matches(rest)
            .into_iter()
            .filter_map(|x| {
                Some(Lexeme {
                    token: statics::TOKENS[x],
                    value: statics::REGEX_LIST[x].find(rest)?.as_str(),
                })
            })
            .max_by_key(|x| x.value.len())
            .unwrap_or(Lexeme {
                token: Token::Unknown,
                value: &rest[..first.len_utf8()],
            })
    }

    pub fn eat_token(&mut self) -> Lexeme<'a> {
        let lexeme = self.peek_token();
        self.idx += lexeme.value.len();
        lexeme
    }

    pub fn peek_non_whitespace(&mut self) -> Lexeme<'a> {
        while let Lexeme {
            token: Token::Whitespace,
            ..
        } = self.peek_token()
        {
            self.eat_token();
        }
        self.peek_token()
    }
}

#[cfg(test)]
mod tests {
    use super::{Lexeme, Scanner, Token, EOF};

    #[test]
    fn test_tokens() {
        let scanner = Scanner::new("");
        assert_eq!(scanner.peek_token(), EOF);

        macro_rules! test_matches {
            {$($tk: ident => $($pat: literal)+ $(!($($npat: literal)+))?)* } => {
                $(
                    $(
                        assert_eq!(
                            Scanner::new($pat).peek_token(),
                            Lexeme { token: Token::$tk, value: $pat }
                        );
                    )+

                    $(
                        $(
                            assert_ne!(
                                Scanner::new($npat).peek_token(),
                                Lexeme { token: Token::$tk, value: $npat }
                            );
                        )*
                    )?
                )*
            };
        }

        test_matches! {
            Id => "a" "a-" "_private" "A9-9-9-9" "empty?" !("9" "-")
            Int => "1" "1234" "-1" !("+1" "-")
            Float => "0.5" "-0.1234" !("1" "1." ".5" ".")
            String => r#""hello!""# r#""""# r#""\"""# "'single'" "'it\\'s'" !(r#"""""# r#""\""#)
            Comparator => "==" "!=" "<>" "<=" ">=" "<" ">" !("=")
            // ensure no regressions because we have to escape these
            Dot => "." !("a")
            Pipe => "|"
            BracketOpen => "["
        }
    }

    macro_rules! lx {
        ($tk: ident, $lit: literal) => {
            Lexeme {
                token: Token::$tk,
                value: $lit,
            }
        };
    }

    #[test]
    fn test_eat() {
        let mut sc = Scanner::new("item.tags[0] | size >= 2");
        assert_eq!(sc.eat_token(), lx!(Id, "item"));
        assert_eq!(sc.eat_token(), lx!(Dot, "."));
        assert_eq!(sc.eat_token(), lx!(Id, "tags"));
        assert_eq!(sc.eat_token(), lx!(BracketOpen, "["));
        assert_eq!(sc.eat_token(), lx!(Int, "0"));
        assert_eq!(sc.eat_token(), lx!(BracketClose, "]"));
        assert_eq!(sc.eat_token(), lx!(Whitespace, " "));
        assert_eq!(sc.eat_token(), lx!(Pipe, "|"));
        assert_eq!(sc.eat_token(), lx!(Whitespace, " "));
        assert_eq!(sc.eat_token(), lx!(Id, "size"));
        assert_eq!(sc.eat_token(), lx!(Whitespace, " "));
        assert_eq!(sc.eat_token(), lx!(Comparator, ">="));
        assert_eq!(sc.eat_token(), lx!(Whitespace, " "));
        assert_eq!(sc.eat_token(), lx!(Int, "2"));
        assert_eq!(sc.eat_token(), EOF);
    }

    #[test]
    fn test_peek_whitespace() {
        let mut sc = Scanner::new("  post.title   contains 'Rust' ");
        assert_eq!(sc.peek_non_whitespace(), lx!(Id, "post"));
        sc.eat_token();
        assert_eq!(sc.eat_token(), lx!(Dot, "."));
        assert_eq!(sc.eat_token(), lx!(Id, "title"));
        assert_eq!(sc.peek_non_whitespace(), lx!(Id, "contains"));
        sc.eat_token();
        assert_eq!(sc.peek_non_whitespace(), lx!(String, "'Rust'"));
        sc.eat_token();
        assert_eq!(sc.peek_non_whitespace(), EOF);
    }

    #[test]
    fn test_unknown_multibyte() {
        let mut sc = Scanner::new("é");
        assert_eq!(sc.eat_token(), lx!(Unknown, "é"));
        assert_eq!(sc.eat_token(), EOF);
    }
}
