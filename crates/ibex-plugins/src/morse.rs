//! Morse code in both directions.

use ibex_framework::prelude::*;

const TABLE: &[(char, &str)] = &[
    ('A', ".-"),
    ('B', "-..."),
    ('C', "-.-."),
    ('D', "-.."),
    ('E', "."),
    ('F', "..-."),
    ('G', "--."),
    ('H', "...."),
    ('I', ".."),
    ('J', ".---"),
    ('K', "-.-"),
    ('L', ".-.."),
    ('M', "--"),
    ('N', "-."),
    ('O', "---"),
    ('P', ".--."),
    ('Q', "--.-"),
    ('R', ".-."),
    ('S', "..."),
    ('T', "-"),
    ('U', "..-"),
    ('V', "...-"),
    ('W', ".--"),
    ('X', "-..-"),
    ('Y', "-.--"),
    ('Z', "--.."),
    ('0', "-----"),
    ('1', ".----"),
    ('2', "..---"),
    ('3', "...--"),
    ('4', "....-"),
    ('5', "....."),
    ('6', "-...."),
    ('7', "--..."),
    ('8', "---.."),
    ('9', "----."),
    ('.', ".-.-.-"),
    (',', "--..--"),
    ('?', "..--.."),
    (':', "---..."),
    (';', "-.-.-."),
    ('-', "-....-"),
    ('_', "..--.-"),
    ('"', ".-..-."),
    ('\'', ".----."),
    ('/', "-..-."),
    ('(', "-.--."),
    (')', "-.--.-"),
    ('=', "-...-"),
];

pub fn processor() -> RuleResult<Processor> {
    Processor::builder("morse")
        .feature("morse")
        .usage("morse (<text>|<morse code>)")
        .rule(on_pattern(r"^morse\s+(.+)$").handler(morse))
        .build()
}

/// Text made only of dots, dashes, word slashes and spaces.
pub fn is_morse(text: &str) -> bool {
    text.contains(['.', '-']) && text.chars().all(|c| matches!(c, '.' | '-' | '/' | ' '))
}

/// Letters are separated by spaces and words by `" / "`. Characters without
/// a code pass through unchanged.
pub fn encode(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .map(|c| {
                    let upper = c.to_ascii_uppercase();
                    TABLE
                        .iter()
                        .find(|(letter, _)| *letter == upper)
                        .map_or_else(|| c.to_string(), |(_, code)| code.to_string())
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Unknown codes pass through unchanged.
pub fn decode(code: &str) -> String {
    code.split('/')
        .map(|word| {
            word.split_whitespace()
                .map(|symbol| {
                    TABLE
                        .iter()
                        .find(|(_, code)| *code == symbol)
                        .map_or_else(|| symbol.to_string(), |(letter, _)| letter.to_string())
                })
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

async fn morse(ctx: Arc<HandlerContext>, args: Captures) {
    let text = args.str(0);
    if is_morse(text) {
        ctx.add_response(decode(text));
    } else {
        ctx.add_response(encode(text));
    }
}
