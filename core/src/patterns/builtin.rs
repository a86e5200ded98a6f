//! Builtin error signatures
//!
//! Patterns are listed per language, most specific first. Within a language
//! the order matters: on equal confidence the earlier entry wins.

use crate::patterns::catalog::FramePreference;
use crate::types::{ErrorCategory as C, Language as L, Severity as S};

/// Static definition of a builtin pattern.
pub struct BuiltinPattern {
    pub language: L,
    pub name: &'static str,
    pub error_kind: &'static str,
    pub regex: &'static str,
    pub severity: S,
    pub category: C,
    pub fixes: &'static [&'static str],
    pub doc_link: Option<&'static str>,
}

/// Static definition of a stack-frame location rule.
pub struct BuiltinLocation {
    pub language: L,
    pub regex: &'static str,
    pub prefer: FramePreference,
    pub skip: &'static [&'static str],
}

const PY_DOCS: Option<&str> = Some("https://docs.python.org/3/library/exceptions.html");
const JS_DOCS: Option<&str> =
    Some("https://developer.mozilla.org/en-US/docs/Web/JavaScript/Reference/Errors");
const JAVA_DOCS: Option<&str> = Some("https://docs.oracle.com/en/java/javase/21/docs/api/");
const RUST_DOCS: Option<&str> = Some("https://doc.rust-lang.org/error_codes/error-index.html");
const CS_DOCS: Option<&str> = Some("https://learn.microsoft.com/en-us/dotnet/api/system.exception");

pub const PATTERNS: &[BuiltinPattern] = &[
    // ---------------------------------------------------------------- Python
    BuiltinPattern {
        language: L::Python,
        name: "IndexError",
        error_kind: "index-out-of-range",
        regex: r"\b(?P<error>IndexError): (?P<message>[^\n]*index out of range)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &[
            "Check the sequence length before indexing (len(seq) > i)",
            "Guard empty sequences before accessing seq[0] or seq[-1]",
            "Iterate directly over the sequence instead of over range(len(seq))",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "KeyError",
        error_kind: "missing-key",
        regex: r"\b(?P<error>KeyError): (?P<key>[^\n]+)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &[
            "Use dict.get(key, default) when the key may be absent",
            "Check membership with `key in mapping` before reading",
            "Verify the key spelling and type (str vs int)",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "AttributeError",
        error_kind: "missing-attribute",
        regex: r"\b(?P<error>AttributeError): '(?P<type>[^']+)' object has no attribute '(?P<attribute>[^']+)'",
        severity: S::Error,
        category: C::TypeError,
        fixes: &[
            "Check that the object is the type you expect (often None)",
            "Verify the attribute name and the installed library version",
            "Use getattr(obj, name, default) for optional attributes",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "ModuleNotFoundError",
        error_kind: "missing-module",
        regex: r"\b(?P<error>ModuleNotFoundError): No module named '(?P<module>[^']+)'",
        severity: S::Error,
        category: C::DependencyError,
        fixes: &[
            "Install the package into the active environment (pip install ...)",
            "Activate the project's virtual environment before running",
            "Check for a local file shadowing the module name",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "ImportError",
        error_kind: "import-failed",
        regex: r"\b(?P<error>ImportError): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::DependencyError,
        fixes: &[
            "Check for circular imports between the modules involved",
            "Verify the imported name exists in the installed version",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "NameError",
        error_kind: "undefined-name",
        regex: r"\b(?P<error>NameError): name '(?P<name>[^']+)' is not defined",
        severity: S::Error,
        category: C::LogicError,
        fixes: &[
            "Define or import the name before it is used",
            "Check for typos and scoping (names defined inside functions)",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "ZeroDivisionError",
        error_kind: "division-by-zero",
        regex: r"\b(?P<error>ZeroDivisionError): (?P<message>[^\n]*(?:division|modulo) by zero)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &["Check the divisor for zero before dividing"],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "FileNotFoundError",
        error_kind: "file-not-found",
        regex: r"\b(?P<error>FileNotFoundError): \[Errno 2\] No such file or directory: '(?P<path>[^']+)'",
        severity: S::Error,
        category: C::IoError,
        fixes: &[
            "Check the path relative to the current working directory",
            "Build paths from __file__ or pathlib.Path for portability",
            "Create the file or directory before opening it",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "PermissionError",
        error_kind: "permission-denied",
        regex: r"\b(?P<error>PermissionError): \[Errno 13\] Permission denied: '(?P<path>[^']+)'",
        severity: S::Error,
        category: C::PermissionError,
        fixes: &[
            "Check file ownership and mode bits",
            "Avoid writing into system or read-only directories",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "RecursionError",
        error_kind: "recursion-limit",
        regex: r"\b(?P<error>RecursionError): (?P<message>maximum recursion depth exceeded[^\n]*)",
        severity: S::Critical,
        category: C::MemoryError,
        fixes: &[
            "Check the recursion base case",
            "Convert deep recursion into an explicit loop or stack",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "SyntaxError",
        error_kind: "syntax-error",
        regex: r"\b(?P<error>SyntaxError|IndentationError|TabError): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::SyntaxError,
        fixes: &[
            "Inspect the line above the reported one for unclosed brackets or quotes",
            "Do not mix tabs and spaces for indentation",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "TypeError",
        error_kind: "type-mismatch",
        regex: r"\b(?P<error>TypeError): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::TypeError,
        fixes: &[
            "Check the argument types passed to the call",
            "Convert values explicitly (str(), int()) before combining them",
        ],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "ValueError",
        error_kind: "invalid-value",
        regex: r"\b(?P<error>ValueError): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &["Validate input before converting or unpacking it"],
        doc_link: PY_DOCS,
    },
    BuiltinPattern {
        language: L::Python,
        name: "Exception",
        error_kind: "unhandled-exception",
        regex: r"(?m)^(?P<error>[A-Z][A-Za-z0-9_.]*(?:Error|Exception)): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::RuntimeError,
        fixes: &["Read the traceback bottom-up to find the failing call in your code"],
        doc_link: PY_DOCS,
    },
    // ------------------------------------------------------------ JavaScript
    BuiltinPattern {
        language: L::JavaScript,
        name: "TypeError",
        error_kind: "null-property-access",
        regex: r"\b(?P<error>TypeError): Cannot read propert(?:y|ies) of (?P<value>undefined|null)(?: \(reading '(?P<property>[^']+)'\))?",
        severity: S::Error,
        category: C::TypeError,
        fixes: &[
            "Guard the access with optional chaining (obj?.prop)",
            "Check that asynchronous data has loaded before reading it",
            "Initialize the value with a sensible default",
        ],
        doc_link: JS_DOCS,
    },
    BuiltinPattern {
        language: L::JavaScript,
        name: "TypeError",
        error_kind: "not-a-function",
        regex: r"\b(?P<error>TypeError): (?P<callee>[\w.$\[\]]+) is not a function",
        severity: S::Error,
        category: C::TypeError,
        fixes: &[
            "Check the import/export style (default vs named)",
            "Verify the method exists on this object and version",
        ],
        doc_link: JS_DOCS,
    },
    BuiltinPattern {
        language: L::JavaScript,
        name: "ReferenceError",
        error_kind: "undefined-name",
        regex: r"\b(?P<error>ReferenceError): (?P<name>[\w$]+) is not defined",
        severity: S::Error,
        category: C::LogicError,
        fixes: &[
            "Declare or import the identifier before use",
            "Check whether the code runs in the environment it expects (browser vs node)",
        ],
        doc_link: JS_DOCS,
    },
    BuiltinPattern {
        language: L::JavaScript,
        name: "RangeError",
        error_kind: "stack-overflow",
        regex: r"\b(?P<error>RangeError): Maximum call stack size exceeded",
        severity: S::Critical,
        category: C::MemoryError,
        fixes: &[
            "Look for unbounded recursion or mutually recursive calls",
            "Check for state updates that trigger themselves",
        ],
        doc_link: JS_DOCS,
    },
    BuiltinPattern {
        language: L::JavaScript,
        name: "Error",
        error_kind: "missing-module",
        regex: r"\b(?P<error>Error): Cannot find module '(?P<module>[^']+)'",
        severity: S::Error,
        category: C::DependencyError,
        fixes: &[
            "Run the package manager install step (npm install)",
            "Check the relative path and file extension of the import",
        ],
        doc_link: JS_DOCS,
    },
    BuiltinPattern {
        language: L::JavaScript,
        name: "Error",
        error_kind: "connection-refused",
        regex: r"\b(?P<error>Error): connect ECONNREFUSED (?P<address>[\w.:\[\]]+)",
        severity: S::Error,
        category: C::NetworkError,
        fixes: &[
            "Check that the target service is running and listening",
            "Verify host and port configuration",
        ],
        doc_link: JS_DOCS,
    },
    BuiltinPattern {
        language: L::JavaScript,
        name: "Error",
        error_kind: "file-not-found",
        regex: r"\b(?P<error>Error): ENOENT: no such file or directory, (?P<operation>\w+) '(?P<path>[^']+)'",
        severity: S::Error,
        category: C::IoError,
        fixes: &["Resolve paths with path.join(__dirname, ...) rather than the working directory"],
        doc_link: JS_DOCS,
    },
    BuiltinPattern {
        language: L::JavaScript,
        name: "UnhandledPromiseRejection",
        error_kind: "unhandled-rejection",
        regex: r"\b(?P<error>UnhandledPromiseRejection(?:Warning)?): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::ConcurrencyError,
        fixes: &[
            "Await the promise inside try/catch or attach .catch()",
            "Register a process-level unhandledRejection handler for logging",
        ],
        doc_link: JS_DOCS,
    },
    BuiltinPattern {
        language: L::JavaScript,
        name: "SyntaxError",
        error_kind: "syntax-error",
        regex: r"\b(?P<error>SyntaxError): (?P<message>Unexpected [^\n]+)",
        severity: S::Error,
        category: C::SyntaxError,
        fixes: &[
            "Check for a missing bracket or comma near the reported position",
            "When parsing JSON, log the raw payload first",
        ],
        doc_link: JS_DOCS,
    },
    // ------------------------------------------------------------ TypeScript
    BuiltinPattern {
        language: L::TypeScript,
        name: "TS2339",
        error_kind: "missing-property",
        regex: r"error (?P<error>TS2339): Property '(?P<property>[^']+)' does not exist on type '(?P<type>[^']+)'",
        severity: S::Error,
        category: C::TypeError,
        fixes: &[
            "Add the property to the type or interface",
            "Narrow the type before accessing the property",
        ],
        doc_link: Some("https://www.typescriptlang.org/docs/handbook/2/narrowing.html"),
    },
    BuiltinPattern {
        language: L::TypeScript,
        name: "TS2307",
        error_kind: "missing-module",
        regex: r"error (?P<error>TS2307): Cannot find module '(?P<module>[^']+)'",
        severity: S::Error,
        category: C::DependencyError,
        fixes: &[
            "Install the package and its @types companion",
            "Check moduleResolution and paths in tsconfig.json",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::TypeScript,
        name: "TSError",
        error_kind: "compile-error",
        regex: r"(?P<file>[\w./\\-]+\.tsx?)\((?P<line>\d+),(?P<column>\d+)\): error (?P<error>TS\d+): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::SyntaxError,
        fixes: &["Run tsc --noEmit locally to see the full diagnostic"],
        doc_link: None,
    },
    // ------------------------------------------------------------------ Java
    BuiltinPattern {
        language: L::Java,
        name: "NullPointerException",
        error_kind: "null-reference",
        regex: r"(?P<error>java\.lang\.NullPointerException)(?:: (?P<message>[^\n]+))?",
        severity: S::Error,
        category: C::LogicError,
        fixes: &[
            "Check which reference is null using the helpful NPE message",
            "Validate inputs with Objects.requireNonNull at boundaries",
            "Prefer Optional for values that may be absent",
        ],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "ArrayIndexOutOfBoundsException",
        error_kind: "index-out-of-range",
        regex: r"(?P<error>java\.lang\.(?:ArrayIndexOutOfBounds|StringIndexOutOfBounds|IndexOutOfBounds)Exception): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &[
            "Check loop bounds (< length, not <= length)",
            "Validate indexes derived from user input",
        ],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "ClassNotFoundException",
        error_kind: "missing-class",
        regex: r"(?P<error>java\.lang\.(?:ClassNotFoundException|NoClassDefFoundError)): (?P<class>[\w.$/]+)",
        severity: S::Error,
        category: C::DependencyError,
        fixes: &[
            "Check that the dependency is on the runtime classpath",
            "Look for version conflicts between transitive dependencies",
        ],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "OutOfMemoryError",
        error_kind: "out-of-memory",
        regex: r"(?P<error>java\.lang\.OutOfMemoryError): (?P<message>[^\n]+)",
        severity: S::Critical,
        category: C::MemoryError,
        fixes: &[
            "Capture a heap dump (-XX:+HeapDumpOnOutOfMemoryError) and inspect retained objects",
            "Raise -Xmx only after ruling out a leak",
        ],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "StackOverflowError",
        error_kind: "stack-overflow",
        regex: r"(?P<error>java\.lang\.StackOverflowError)",
        severity: S::Critical,
        category: C::MemoryError,
        fixes: &["Look for unbounded recursion in the repeated frames of the trace"],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "ClassCastException",
        error_kind: "invalid-cast",
        regex: r"(?P<error>java\.lang\.ClassCastException): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::TypeError,
        fixes: &["Check the runtime type with instanceof before casting"],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "NumberFormatException",
        error_kind: "invalid-number",
        regex: r#"(?P<error>java\.lang\.NumberFormatException): For input string: "(?P<input>[^"]*)""#,
        severity: S::Error,
        category: C::LogicError,
        fixes: &["Trim and validate the string before parsing it"],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "ConcurrentModificationException",
        error_kind: "concurrent-modification",
        regex: r"(?P<error>java\.util\.ConcurrentModificationException)",
        severity: S::Error,
        category: C::ConcurrencyError,
        fixes: &[
            "Remove elements through Iterator.remove() while iterating",
            "Use a concurrent collection when several threads share it",
        ],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "SQLException",
        error_kind: "database-error",
        regex: r"(?P<error>java\.sql\.SQL\w*Exception): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::IoError,
        fixes: &[
            "Check connection pool limits and query timeouts",
            "Log the failing statement with its bound parameters",
        ],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "FileNotFoundException",
        error_kind: "file-not-found",
        regex: r"(?P<error>java\.io\.FileNotFoundException): (?P<path>[^\n]+)",
        severity: S::Error,
        category: C::IoError,
        fixes: &["Load bundled files through the classloader instead of the filesystem"],
        doc_link: JAVA_DOCS,
    },
    BuiltinPattern {
        language: L::Java,
        name: "Exception",
        error_kind: "uncaught-exception",
        regex: r#"Exception in thread "(?P<thread>[^"]+)" (?P<error>[\w.$]+)(?:: (?P<message>[^\n]+))?"#,
        severity: S::Error,
        category: C::RuntimeError,
        fixes: &["Read the first `at` frame that belongs to your own package"],
        doc_link: JAVA_DOCS,
    },
    // ------------------------------------------------------------------ Rust
    BuiltinPattern {
        language: L::Rust,
        name: "panic",
        error_kind: "index-out-of-range",
        regex: r"index out of bounds: the len is (?P<len>\d+) but the index is (?P<index>\d+)",
        severity: S::Critical,
        category: C::LogicError,
        fixes: &[
            "Use slice.get(i) and handle the None case",
            "Check the length before indexing",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Rust,
        name: "panic",
        error_kind: "unwrap-none",
        regex: r"called `Option::unwrap\(\)` on a `None` value",
        severity: S::Critical,
        category: C::LogicError,
        fixes: &[
            "Replace unwrap() with a match, if let, or ok_or(...)?",
            "Use expect(\"...\") with a message describing the invariant",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Rust,
        name: "panic",
        error_kind: "unwrap-err",
        regex: r"called `Result::unwrap\(\)` on an `Err` value: (?P<error_value>[^\n]+)",
        severity: S::Critical,
        category: C::LogicError,
        fixes: &[
            "Propagate the error with ? instead of unwrapping",
            "Handle the specific error variant shown in the message",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Rust,
        name: "E0382",
        error_kind: "use-after-move",
        regex: r"error\[(?P<error>E0382)\]: (?P<message>(?:borrow|use) of moved value: `(?P<value>[^`]+)`)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &[
            "Borrow the value (&value) instead of moving it",
            "Clone the value if both owners need it",
        ],
        doc_link: RUST_DOCS,
    },
    BuiltinPattern {
        language: L::Rust,
        name: "E0433",
        error_kind: "unresolved-path",
        regex: r"error\[(?P<error>E0433)\]: (?P<message>failed to resolve: [^\n]+)",
        severity: S::Error,
        category: C::DependencyError,
        fixes: &["Add the missing `use` or dependency in Cargo.toml"],
        doc_link: RUST_DOCS,
    },
    BuiltinPattern {
        language: L::Rust,
        name: "rustc",
        error_kind: "compile-error",
        regex: r"error\[(?P<error>E\d{4})\]: (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::SyntaxError,
        fixes: &["Run `rustc --explain` with the error code for a worked example"],
        doc_link: RUST_DOCS,
    },
    BuiltinPattern {
        language: L::Rust,
        name: "panic",
        error_kind: "stack-overflow",
        regex: r"thread '(?P<thread>[^']+)' has overflowed its stack",
        severity: S::Critical,
        category: C::MemoryError,
        fixes: &["Look for unbounded recursion or large stack-allocated arrays"],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Rust,
        name: "panic",
        error_kind: "panic",
        regex: r"thread '(?P<thread>[^']+)' panicked at (?P<file>[^\s:']+\.rs):(?P<line>\d+):(?P<column>\d+)",
        severity: S::Critical,
        category: C::RuntimeError,
        fixes: &["Re-run with RUST_BACKTRACE=1 to see the full call stack"],
        doc_link: None,
    },
    // -------------------------------------------------------------------- Go
    BuiltinPattern {
        language: L::Go,
        name: "panic",
        error_kind: "nil-dereference",
        regex: r"panic: runtime error: invalid memory address or nil pointer dereference",
        severity: S::Critical,
        category: C::MemoryError,
        fixes: &[
            "Check returned pointers and errors before dereferencing",
            "Initialize maps and struct pointers before use",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Go,
        name: "panic",
        error_kind: "index-out-of-range",
        regex: r"panic: runtime error: index out of range \[(?P<index>-?\d+)\] with length (?P<length>\d+)",
        severity: S::Critical,
        category: C::LogicError,
        fixes: &["Check len(slice) before indexing"],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Go,
        name: "fatal error",
        error_kind: "concurrent-map-access",
        regex: r"fatal error: concurrent map (?P<operation>writes|read and map write|iteration and map write)",
        severity: S::Critical,
        category: C::ConcurrencyError,
        fixes: &[
            "Guard the map with a sync.Mutex or sync.RWMutex",
            "Use sync.Map for highly concurrent access",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Go,
        name: "fatal error",
        error_kind: "deadlock",
        regex: r"fatal error: all goroutines are asleep - deadlock!",
        severity: S::Critical,
        category: C::ConcurrencyError,
        fixes: &[
            "Check for channel sends without a receiver",
            "Make sure every WaitGroup.Add has a matching Done",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Go,
        name: "go",
        error_kind: "missing-module",
        regex: r"no required module provides package (?P<package>[^\s;]+)",
        severity: S::Error,
        category: C::DependencyError,
        fixes: &["Run `go get` for the package and `go mod tidy`"],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Go,
        name: "panic",
        error_kind: "panic",
        regex: r"(?m)^panic: (?P<message>[^\n]+)",
        severity: S::Critical,
        category: C::RuntimeError,
        fixes: &["Read the first goroutine trace frame in your module"],
        doc_link: None,
    },
    // ------------------------------------------------------------------ Ruby
    BuiltinPattern {
        language: L::Ruby,
        name: "NoMethodError",
        error_kind: "undefined-method",
        regex: r"(?P<error>NoMethodError)(?: \(|: )undefined method [`'](?P<method>[^'`]+)' for (?P<receiver>[^\n)]+)",
        severity: S::Error,
        category: C::TypeError,
        fixes: &[
            "Check for nil receivers; use the safe navigation operator (&.)",
            "Verify the method name and the object's class",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Ruby,
        name: "NameError",
        error_kind: "uninitialized-constant",
        regex: r"(?P<error>NameError)(?: \(|: )uninitialized constant (?P<constant>[\w:]+)",
        severity: S::Error,
        category: C::DependencyError,
        fixes: &[
            "Require the file or gem that defines the constant",
            "Check the constant's namespace and file naming for autoloading",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Ruby,
        name: "LoadError",
        error_kind: "missing-module",
        regex: r"(?P<error>LoadError)(?: \(|: )cannot load such file -- (?P<path>\S+)",
        severity: S::Error,
        category: C::DependencyError,
        fixes: &["Add the gem to the Gemfile and run bundle install"],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Ruby,
        name: "RecordNotFound",
        error_kind: "record-not-found",
        regex: r"(?P<error>ActiveRecord::RecordNotFound)(?: \(|: )(?P<message>[^\n)]+)",
        severity: S::Warning,
        category: C::LogicError,
        fixes: &["Use find_by and handle nil, or rescue and render a 404"],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Ruby,
        name: "ArgumentError",
        error_kind: "wrong-arity",
        regex: r"(?P<error>ArgumentError)(?: \(|: )wrong number of arguments \(given (?P<given>\d+), expected (?P<expected>[\d.+]+)\)",
        severity: S::Error,
        category: C::TypeError,
        fixes: &["Match the call site to the method signature"],
        doc_link: None,
    },
    // -------------------------------------------------------------------- C#
    BuiltinPattern {
        language: L::CSharp,
        name: "NullReferenceException",
        error_kind: "null-reference",
        regex: r"(?P<error>System\.NullReferenceException): (?P<message>Object reference not set to an instance of an object\.?)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &[
            "Enable nullable reference types to catch this at compile time",
            "Use the null-conditional operator (?.) for optional values",
        ],
        doc_link: CS_DOCS,
    },
    BuiltinPattern {
        language: L::CSharp,
        name: "IndexOutOfRangeException",
        error_kind: "index-out-of-range",
        regex: r"(?P<error>System\.(?:IndexOutOfRange|ArgumentOutOfRange)Exception): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &["Check Length/Count before indexing"],
        doc_link: CS_DOCS,
    },
    BuiltinPattern {
        language: L::CSharp,
        name: "ArgumentNullException",
        error_kind: "null-argument",
        regex: r"(?P<error>System\.ArgumentNullException): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &["Validate arguments at the public API boundary"],
        doc_link: CS_DOCS,
    },
    BuiltinPattern {
        language: L::CSharp,
        name: "InvalidOperationException",
        error_kind: "invalid-operation",
        regex: r"(?P<error>System\.InvalidOperationException): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::LogicError,
        fixes: &["Check object state before the call (e.g. empty sequences with First())"],
        doc_link: CS_DOCS,
    },
    BuiltinPattern {
        language: L::CSharp,
        name: "FileNotFoundException",
        error_kind: "file-not-found",
        regex: r"(?P<error>System\.IO\.FileNotFoundException): (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::IoError,
        fixes: &["Copy the file to the output directory or fix the relative path"],
        doc_link: CS_DOCS,
    },
    BuiltinPattern {
        language: L::CSharp,
        name: "SqlException",
        error_kind: "database-error",
        regex: r"(?P<error>(?:System|Microsoft)\.Data\.SqlClient\.SqlException)(?: \(0x[0-9A-Fa-f]+\))?: (?P<message>[^\n]+)",
        severity: S::Error,
        category: C::IoError,
        fixes: &["Check connection strings, command timeouts and pool exhaustion"],
        doc_link: CS_DOCS,
    },
    // ------------------------------------------------------------------- PHP
    BuiltinPattern {
        language: L::Php,
        name: "Uncaught",
        error_kind: "uncaught-exception",
        regex: r"Fatal error:\s+Uncaught (?P<error>[\w\\]+): (?P<message>[^\n]+?) in (?P<file>\S+\.php):(?P<line>\d+)",
        severity: S::Critical,
        category: C::RuntimeError,
        fixes: &["Catch the exception where it can be handled, or register an exception handler"],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Php,
        name: "Error",
        error_kind: "undefined-function",
        regex: r"Fatal error:\s+(?:Uncaught Error: )?Call to undefined function (?P<function>[\w\\]+)\(\)",
        severity: S::Critical,
        category: C::DependencyError,
        fixes: &[
            "Check that the extension providing the function is enabled",
            "Verify the namespace import of the function",
        ],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Php,
        name: "Warning",
        error_kind: "undefined-variable",
        regex: r"(?:Warning|Notice):\s+Undefined (?P<what>variable|index|array key) \$?(?P<name>\S+) in (?P<file>\S+\.php) on line (?P<line>\d+)",
        severity: S::Warning,
        category: C::LogicError,
        fixes: &["Initialize the variable or check isset() before reading it"],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Php,
        name: "ParseError",
        error_kind: "syntax-error",
        regex: r"Parse error:\s+syntax error, (?P<message>[^\n]+?) in (?P<file>\S+\.php) on line (?P<line>\d+)",
        severity: S::Error,
        category: C::SyntaxError,
        fixes: &["Run `php -l` on the file to lint it"],
        doc_link: None,
    },
    BuiltinPattern {
        language: L::Php,
        name: "Fatal error",
        error_kind: "out-of-memory",
        regex: r"Allowed memory size of (?P<limit>\d+) bytes exhausted",
        severity: S::Critical,
        category: C::MemoryError,
        fixes: &[
            "Process large data sets in chunks or generators",
            "Raise memory_limit only after checking for leaks",
        ],
        doc_link: None,
    },
];

pub const LOCATIONS: &[BuiltinLocation] = &[
    BuiltinLocation {
        language: L::Python,
        regex: r#"File "(?P<file>[^"]+)", line (?P<line>\d+)"#,
        prefer: FramePreference::Last,
        skip: &["<frozen", "<string>", "site-packages", "dist-packages"],
    },
    BuiltinLocation {
        language: L::JavaScript,
        regex: r"at (?:[^\s()]+ )?\(?(?P<file>(?:[A-Za-z]:)?[^\s():]+\.(?:js|mjs|cjs|jsx|ts|tsx)):(?P<line>\d+):(?P<column>\d+)\)?",
        prefer: FramePreference::First,
        skip: &["node_modules", "node:internal"],
    },
    BuiltinLocation {
        language: L::TypeScript,
        regex: r"(?P<file>[\w./\\-]+\.tsx?)[(:](?P<line>\d+)[,:](?P<column>\d+)",
        prefer: FramePreference::First,
        skip: &["node_modules"],
    },
    BuiltinLocation {
        language: L::Java,
        regex: r"at [\w.$<>]+\((?P<file>[\w$]+\.(?:java|kt|scala)):(?P<line>\d+)\)",
        prefer: FramePreference::First,
        skip: &[],
    },
    BuiltinLocation {
        language: L::Rust,
        regex: r"(?P<file>[\w./\\-]+\.rs):(?P<line>\d+):(?P<column>\d+)",
        prefer: FramePreference::First,
        skip: &["/rustc/", ".cargo/registry"],
    },
    BuiltinLocation {
        language: L::Go,
        regex: r"(?P<file>(?:[A-Za-z]:)?[\w./\\-]+\.go):(?P<line>\d+)",
        prefer: FramePreference::First,
        skip: &["/go/src/runtime/", "/usr/local/go/", "/pkg/mod/"],
    },
    BuiltinLocation {
        language: L::Ruby,
        regex: r"(?P<file>[\w./\\-]+\.rb):(?P<line>\d+)",
        prefer: FramePreference::First,
        skip: &["/gems/"],
    },
    BuiltinLocation {
        language: L::CSharp,
        regex: r"in (?P<file>\S+\.cs):line (?P<line>\d+)",
        prefer: FramePreference::First,
        skip: &[],
    },
    BuiltinLocation {
        language: L::Php,
        regex: r"(?:in |#\d+ )(?P<file>\S+\.php)(?:\(|:| on line )(?P<line>\d+)",
        prefer: FramePreference::First,
        skip: &["/vendor/"],
    },
];

pub const KNOWN_EXCEPTIONS: &[(L, &[&str])] = &[
    (
        L::Python,
        &[
            "ArithmeticError", "AssertionError", "AttributeError", "BlockingIOError",
            "BrokenPipeError", "ConnectionError", "ConnectionRefusedError",
            "ConnectionResetError", "EOFError", "Exception", "FileExistsError",
            "FileNotFoundError", "FloatingPointError", "ImportError", "IndentationError",
            "IndexError", "IsADirectoryError", "KeyError", "KeyboardInterrupt",
            "LookupError", "MemoryError", "ModuleNotFoundError", "NameError",
            "NotADirectoryError", "NotImplementedError", "OSError", "OverflowError",
            "PermissionError", "RecursionError", "ReferenceError", "RuntimeError",
            "StopIteration", "SyntaxError", "SystemError", "TabError", "TimeoutError",
            "TypeError", "UnboundLocalError", "UnicodeDecodeError", "UnicodeEncodeError",
            "ValueError", "ZeroDivisionError",
        ],
    ),
    (
        L::JavaScript,
        &[
            "AggregateError", "Error", "EvalError", "RangeError", "ReferenceError",
            "SyntaxError", "TypeError", "URIError", "UnhandledPromiseRejection",
            "UnhandledPromiseRejectionWarning",
        ],
    ),
    (L::TypeScript, &["TS2304", "TS2307", "TS2322", "TS2339", "TS2345", "TS7006"]),
    (
        L::Java,
        &[
            "ArithmeticException", "ArrayIndexOutOfBoundsException", "ClassCastException",
            "ClassNotFoundException", "ConcurrentModificationException",
            "FileNotFoundException", "IllegalArgumentException", "IllegalStateException",
            "IndexOutOfBoundsException", "IOException", "NoClassDefFoundError",
            "NullPointerException", "NumberFormatException", "OutOfMemoryError",
            "SQLException", "SQLTimeoutException", "StackOverflowError",
            "StringIndexOutOfBoundsException", "UnsupportedOperationException",
        ],
    ),
    (L::Rust, &["panic", "E0382", "E0433", "E0308", "E0425", "E0599"]),
    (L::Go, &["panic", "fatal error"]),
    (
        L::Ruby,
        &[
            "ArgumentError", "IOError", "KeyError", "LoadError", "NameError",
            "NoMethodError", "RecordNotFound", "RuntimeError", "StandardError",
            "TypeError", "ZeroDivisionError",
        ],
    ),
    (
        L::CSharp,
        &[
            "ArgumentException", "ArgumentNullException", "ArgumentOutOfRangeException",
            "FileNotFoundException", "IndexOutOfRangeException", "InvalidCastException",
            "InvalidOperationException", "KeyNotFoundException", "NullReferenceException",
            "SqlException", "TimeoutException",
        ],
    ),
    (
        L::Php,
        &[
            "ArgumentCountError", "DivisionByZeroError", "Error", "ErrorException",
            "Exception", "InvalidArgumentException", "PDOException", "RuntimeException",
            "TypeError", "ValueError",
        ],
    ),
];
