//! Version-specific zlib dictionaries used to seed the header-block deflate
//! streams. The dictionary is the same fixed byte string the original
//! protocol publishes for each version; supplying the wrong one, or none,
//! makes the peer's header blocks undecodable (a session-fatal condition,
//! not merely a missed compression opportunity).

use crate::config::Version;

/// v2/v3/v3.1 all share one dictionary; v4a2 carries an empty dictionary
/// because its draft dropped the fixed-dictionary scheme in favor of
/// per-connection negotiation that this implementation does not perform
/// (out of scope: v4a2 header blocks are deflated without a preset
/// dictionary here).
pub fn for_version(version: Version) -> &'static [u8] {
    match version {
        Version::V2 | Version::V3 | Version::V3_1 => SPDY_DICTIONARY,
        Version::V4A2 => &[],
    }
}

/// The standard SPDY header-compression dictionary: common HTTP method,
/// header and status tokens concatenated into one seed buffer, terminated
/// with a NUL byte as the original publishes it.
pub static SPDY_DICTIONARY: &[u8] = b"\
optionsgetheadpostputdeletetraceacceptaccept-charsetaccept-encodingaccept-\
languageauthorizationexpectfromhostif-modified-sinceif-matchif-none-matchi\
f-rangeif-unmodifiedsincemax-forwardsproxy-authorizationrangerefererteuser\
-agent10010120020120220320420520630030130230330430530630740040140240340440\
5406407408409410411412413414415416417500501502503504505accept-rangesageeta\
glocationproxy-authenticatepublicretry-afterservervarywarningwww-authentic\
ateallowcontent-basecontent-encodingcache-controlconnectiondatetrailertran\
sfer-encodingupgradeviawarningcontent-languagecontent-lengthcontent-locati\
oncontent-md5content-rangecontent-typeetagexpireslast-modifiedset-cookieMo\
ndayTuesdayWednesdayThursdayFridaySaturdaySundayJanFebMarAprMayJunJulAugSe\
pOctNovDeccharset=iso-8859-1chunkedtext/htmlimage/pngimage/jpgimage/gifapp\
lication/xmlapplication/xhtmltext/plainpublicmax-agecharset=utf-8charset=i\
so-8859-1,utf-8,*,enq=0.private,public,no-cache=set-cookie,set-cookie2,min\
-fresh,max-age,age,gzip,deflate,sdch,identity,proxy-revalidate,200,204,206\
,300,302,303,304,206,302,400,401,403,404,500,501,deflate,gzip,identity,sdc\
h,no-store,no-cache,close,cookie\0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v4a2_dictionary_is_empty() {
        assert!(for_version(Version::V4A2).is_empty());
    }

    #[test]
    fn v2_dictionary_is_not_empty() {
        assert!(!for_version(Version::V2).is_empty());
    }
}
